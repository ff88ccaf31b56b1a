use std::collections::HashSet;

use crate::domain::track::{CleanRow, RawRow};

/// Drops rows without a track id and every repeated id after its first occurrence.
///
/// Input order is preserved among the survivors.
pub fn dedup(rows: &[RawRow]) -> Vec<CleanRow> {
    let mut seen = HashSet::new();
    let clean = rows
        .iter()
        .filter_map(CleanRow::from_raw)
        .filter(|row| seen.insert(row.track_id.clone()))
        .collect::<Vec<_>>();

    if clean.len() < rows.len() {
        log::debug!(
            "dropped {} rows without id or with a duplicate id",
            rows.len() - clean.len()
        );
    }
    clean
}
