//! The per-run CSV artifact: record layout, codec and key naming

pub mod codec;
pub mod key;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::track::RankedRow;

pub use codec::{read_raw_rows, read_records, write_rows};
pub use key::artifact_key;

/// Column order of every artifact, also written alone when a batch is empty
pub const FIELD_NAMES: [&str; 13] = [
    "artist",
    "album_name",
    "track_name",
    "track_id",
    "duration_ms",
    "explicit",
    "album_release_date",
    "track_popularity",
    "album_id",
    "duration_minutes",
    "length_category",
    "album_track_count",
    "album_popularity_rank",
];

/// Flat on-disk form of a [`RankedRow`]. Field order must match [`FIELD_NAMES`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub artist: String,
    pub album_name: Option<String>,
    pub track_name: String,
    pub track_id: String,
    pub duration_ms: Option<String>,
    pub explicit: Option<bool>,
    pub album_release_date: Option<String>,
    pub track_popularity: Option<u32>,
    pub album_id: Option<String>,
    pub duration_minutes: Option<f64>,
    pub length_category: Option<String>,
    pub album_track_count: Option<usize>,
    pub album_popularity_rank: Option<usize>,
}

impl From<&RankedRow> for TrackRecord {
    fn from(ranked: &RankedRow) -> Self {
        let clean = ranked.clean();
        Self {
            artist: clean.artist.clone(),
            album_name: clean.album_name.clone(),
            track_name: clean.track_name.clone(),
            track_id: clean.track_id.clone(),
            duration_ms: clean.duration_ms.clone(),
            explicit: clean.explicit,
            album_release_date: clean.album_release_date.clone(),
            track_popularity: clean.track_popularity,
            album_id: clean.album_id.clone(),
            duration_minutes: ranked.row.duration_minutes,
            length_category: ranked.row.length_category.map(|c| c.label().to_string()),
            album_track_count: ranked.album_track_count,
            album_popularity_rank: ranked.album_popularity_rank,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush csv payload: {0}")]
    Flush(String),

    #[error("artifact is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}
