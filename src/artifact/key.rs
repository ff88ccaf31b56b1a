use chrono::{DateTime, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Builds `<prefix><base>_<YYYYMMDD_HHMMSS>.csv`.
///
/// A non-empty prefix always ends up separated from the file name by `/`.
pub fn artifact_key(prefix: &str, base: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}{base}_{}.csv",
        normalize_prefix(prefix),
        at.format(TIMESTAMP_FORMAT)
    )
}

pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_start_matches('/');
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

/// true for keys directly under `prefix` that look like artifacts named after `base`
pub fn is_artifact_key(key: &str, prefix: &str, base: &str) -> bool {
    let prefix = normalize_prefix(prefix);
    key.strip_prefix(prefix.as_str())
        .is_some_and(|name| !name.contains('/') && name.starts_with(base) && name.ends_with(".csv"))
}
