use std::collections::HashMap;

use crate::domain::track::{EnrichedRow, RankedRow};

/// Track count and dense popularity rank of one album
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlbumStanding {
    pub track_count: usize,
    pub rank: usize,
}

/// Counts rows per non-empty album name and dense-ranks albums by that count.
///
/// The largest count gets rank 1 and every smaller distinct count the next
/// integer, so ties share a rank and no rank is skipped.
pub fn album_standings(rows: &[EnrichedRow]) -> HashMap<String, AlbumStanding> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for album in rows.iter().filter_map(|r| r.row.album_key()) {
        *counts.entry(album).or_default() += 1;
    }

    let mut distinct_counts = counts.values().copied().collect::<Vec<_>>();
    distinct_counts.sort_unstable_by(|a, b| b.cmp(a));
    distinct_counts.dedup();

    counts
        .into_iter()
        .map(|(album, track_count)| {
            // descending order, so position among distinct counts is the dense rank
            let rank = distinct_counts
                .binary_search_by(|probe| track_count.cmp(probe))
                .map(|idx| idx + 1)
                .unwrap_or_default();
            (album.to_string(), AlbumStanding { track_count, rank })
        })
        .collect()
}

/// Joins album count and rank back onto every row, keeping input order.
///
/// Rows without an album keep `None` for both.
pub fn rank(rows: Vec<EnrichedRow>) -> Vec<RankedRow> {
    let standings = album_standings(&rows);
    rows.into_iter()
        .map(|row| {
            let standing = row.row.album_key().and_then(|album| standings.get(album));
            RankedRow {
                album_track_count: standing.map(|s| s.track_count),
                album_popularity_rank: standing.map(|s| s.rank),
                row,
            }
        })
        .collect()
}
