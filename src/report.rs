//! Operator-facing summaries of a transformed batch

use std::{collections::HashMap, fmt::Display};

use serde::Serialize;

use crate::domain::{length::LengthCategory, track::RankedRow};

const UNCATEGORISED: &str = "uncategorised";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub tracks: usize,
    pub avg_minutes: Option<f64>,
    pub avg_album_rank: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistCount {
    pub artist: String,
    pub tracks: usize,
}

#[derive(Default)]
struct Acc {
    tracks: usize,
    minutes: Vec<f64>,
    ranks: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    Some((avg * 100.0).round() / 100.0)
}

/// One line per length category present in `rows`: Short, Medium, Long, then
/// rows without a duration.
pub fn length_summary(rows: &[RankedRow]) -> Vec<CategorySummary> {
    let mut by_category: HashMap<Option<LengthCategory>, Acc> = HashMap::new();
    for row in rows {
        let acc = by_category.entry(row.row.length_category).or_default();
        acc.tracks += 1;
        acc.minutes.extend(row.row.duration_minutes);
        acc.ranks.extend(row.album_popularity_rank.map(|r| r as f64));
    }

    LengthCategory::ALL
        .into_iter()
        .map(Some)
        .chain(std::iter::once(None))
        .filter_map(|category| {
            let acc = by_category.remove(&category)?;
            Some(CategorySummary {
                category: category.map_or(UNCATEGORISED.to_string(), |c| c.label().to_string()),
                tracks: acc.tracks,
                avg_minutes: mean(&acc.minutes),
                avg_album_rank: mean(&acc.ranks),
            })
        })
        .collect()
}

/// Tracks per artist, most tracks first, ties by name
pub fn artist_counts(rows: &[RankedRow]) -> Vec<ArtistCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.clean().artist.as_str()).or_default() += 1;
    }

    let mut counts = counts
        .into_iter()
        .map(|(artist, tracks)| ArtistCount {
            artist: artist.to_string(),
            tracks,
        })
        .collect::<Vec<_>>();
    counts.sort_by(|a, b| b.tracks.cmp(&a.tracks).then_with(|| a.artist.cmp(&b.artist)));
    counts
}

fn opt(value: Option<f64>) -> String {
    value.map_or("-".to_string(), |v| format!("{v:.2}"))
}

impl Display for CategorySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<18} {:>6} tracks  avg {:>6} min  avg rank {:>6}",
            self.category,
            self.tracks,
            opt(self.avg_minutes),
            opt(self.avg_album_rank)
        )
    }
}

impl Display for ArtistCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<30} {:>6}", self.artist, self.tracks)
    }
}
