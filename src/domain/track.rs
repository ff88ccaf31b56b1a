use serde::{Deserialize, Deserializer};

use super::length::LengthCategory;

/// One track as it came out of the catalog, before any cleaning.
///
/// Every field except `artist` and `track_name` may legitimately be missing:
/// catalogs carry under-specified entries and raw CSV exports drop columns.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct RawRow {
    pub artist: String,
    pub album_name: Option<String>,
    pub track_name: String,
    pub track_id: Option<String>,
    /// Kept as the raw text the source gave us, parsed only during enrichment
    pub duration_ms: Option<String>,
    #[serde(deserialize_with = "loose_bool")]
    pub explicit: Option<bool>,
    pub album_release_date: Option<String>,
    pub track_popularity: Option<u32>,
    pub album_id: Option<String>,
}

/// A raw row with a present track id, unique within its batch.
///
/// Built by copying a [`RawRow`], never by borrowing it.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRow {
    pub artist: String,
    pub album_name: Option<String>,
    pub track_name: String,
    pub track_id: String,
    pub duration_ms: Option<String>,
    pub explicit: Option<bool>,
    pub album_release_date: Option<String>,
    pub track_popularity: Option<u32>,
    pub album_id: Option<String>,
}

impl CleanRow {
    /// copies the raw row, returns `None` when the track id is missing or blank
    pub fn from_raw(raw: &RawRow) -> Option<Self> {
        let track_id = raw.track_id.as_deref().filter(|id| !id.trim().is_empty())?;
        Some(Self {
            artist: raw.artist.clone(),
            album_name: raw.album_name.clone(),
            track_name: raw.track_name.clone(),
            track_id: track_id.to_string(),
            duration_ms: raw.duration_ms.clone(),
            explicit: raw.explicit,
            album_release_date: raw.album_release_date.clone(),
            track_popularity: raw.track_popularity,
            album_id: raw.album_id.clone(),
        })
    }

    /// album name usable as a grouping key, `None` for absent or empty names
    pub fn album_key(&self) -> Option<&str> {
        self.album_name.as_deref().filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRow {
    pub row: CleanRow,
    pub duration_minutes: Option<f64>,
    pub length_category: Option<LengthCategory>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub row: EnrichedRow,
    /// number of rows in the batch sharing this row's album
    pub album_track_count: Option<usize>,
    /// dense rank of the album by track count, 1 = most tracks
    pub album_popularity_rank: Option<usize>,
}

impl RankedRow {
    pub fn clean(&self) -> &CleanRow {
        &self.row.row
    }
}

/// Accepts `true`/`false` in any letter case (pandas writes `True`/`False`),
/// an empty field reads as `None`.
fn loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(Some(true)),
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(Some(false)),
        Some(v) => Err(serde::de::Error::custom(format!(
            "invalid boolean value '{v}'"
        ))),
    }
}
