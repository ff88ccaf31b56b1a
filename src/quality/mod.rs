//! Cross-layer data quality: the curated albums must be a non-empty subset of
//! the processed ones.

use serde::Serialize;
use thiserror::Error;

use crate::warehouse::GroupCounts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconciliationSample {
    pub upstream_album_count: u64,
    pub downstream_album_count: u64,
    /// logged only
    pub upstream_row_count: u64,
    /// logged only
    pub downstream_track_total: u64,
}

impl ReconciliationSample {
    pub fn new(processed: GroupCounts, curated: GroupCounts) -> Self {
        Self {
            upstream_album_count: processed.albums,
            downstream_album_count: curated.albums,
            upstream_row_count: processed.metric,
            downstream_track_total: curated.metric,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QualityError {
    #[error("curated dataset has no albums (processed album count {upstream})")]
    EmptyCuratedDataset { upstream: u64 },

    #[error("curated album count {downstream} exceeds processed album count {upstream}")]
    SubsetInvariantViolation { downstream: u64, upstream: u64 },
}

/// Passes when `0 < downstream <= upstream`.
///
/// Only the album counts decide; row and track totals ride along for the log.
pub fn reconcile(sample: &ReconciliationSample) -> Result<(), QualityError> {
    let upstream = sample.upstream_album_count;
    let downstream = sample.downstream_album_count;

    log::info!(
        "reconciling: processed {upstream} albums / {} rows, curated {downstream} albums / {} tracks",
        sample.upstream_row_count,
        sample.downstream_track_total
    );

    if downstream == 0 {
        return Err(QualityError::EmptyCuratedDataset { upstream });
    }
    if downstream > upstream {
        return Err(QualityError::SubsetInvariantViolation {
            downstream,
            upstream,
        });
    }

    log::info!("reconciliation passed: {downstream} <= {upstream}");
    Ok(())
}
