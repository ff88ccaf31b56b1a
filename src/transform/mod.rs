//! Pure row transforms shared by every execution context.
//!
//! `dedup -> enrich -> rank` always runs in that order: deduplication is
//! order sensitive and ranking counts only clean rows.

pub mod dedup;
pub mod enrich;
pub mod rank;

use crate::domain::track::{RankedRow, RawRow};

pub use dedup::dedup;
pub use enrich::enrich;
pub use rank::rank;

/// Runs the whole transform over one batch
pub fn transform_rows(raw: &[RawRow]) -> Vec<RankedRow> {
    let clean = dedup(raw);
    let enriched = clean.into_iter().map(enrich).collect::<Vec<_>>();
    rank(enriched)
}

#[cfg(test)]
mod tests {
    use crate::domain::{length::LengthCategory, track::RawRow};

    use super::transform_rows;

    fn raw(id: &str, album: &str, duration_ms: &str) -> RawRow {
        RawRow {
            artist: "Artist".into(),
            album_name: Some(album.into()),
            track_name: format!("Song {id}"),
            track_id: Some(id.into()),
            duration_ms: Some(duration_ms.into()),
            explicit: Some(false),
            ..Default::default()
        }
    }

    #[test]
    fn two_tracks_of_one_album() {
        let rows = transform_rows(&[raw("t1", "Album", "120000"), raw("t2", "Album", "360000")]);

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.album_track_count, Some(2));
            assert_eq!(row.album_popularity_rank, Some(1));
        }
        assert_eq!(rows[0].row.length_category, Some(LengthCategory::Short));
        assert_eq!(rows[1].row.length_category, Some(LengthCategory::Long));
    }

    #[test]
    fn duplicates_do_not_inflate_album_counts() {
        let rows = transform_rows(&[
            raw("t1", "A", "200000"),
            raw("t1", "A", "200000"),
            raw("t2", "B", "200000"),
        ]);

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.album_track_count == Some(1)));
        assert!(rows.iter().all(|r| r.album_popularity_rank == Some(1)));
    }

    #[test]
    fn empty_batch() {
        assert!(transform_rows(&[]).is_empty());
    }
}
