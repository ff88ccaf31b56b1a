use std::fmt::Display;

/// Three-bucket track length classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LengthCategory {
    Short,
    Medium,
    Long,
}

impl LengthCategory {
    pub const ALL: [LengthCategory; 3] = [Self::Short, Self::Medium, Self::Long];

    /// `< 3` is short, `3 ..= 5` is medium, anything above 5 is long
    pub fn from_minutes(minutes: f64) -> Self {
        if minutes < 3.0 {
            Self::Short
        } else if minutes <= 5.0 {
            Self::Medium
        } else {
            Self::Long
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Short => "Short (<3 min)",
            Self::Medium => "Medium (3-5 min)",
            Self::Long => "Long (>5 min)",
        }
    }
}

impl Display for LengthCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
