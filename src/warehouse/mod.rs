//! Local SQLite warehouse: the processed layer loaded from artifacts and the
//! curated `gold` layer rebuilt from it.

pub mod db;
pub mod error;
pub mod operations;
pub(crate) mod schema;

use error::WarehouseError;

pub use operations::Warehouse;

/// A row-level metric and a distinct album count read from one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct GroupCounts {
    /// rows in the processed layer, summed track counts in the curated one
    pub metric: u64,
    pub albums: u64,
}

/// A queryable materialization of the dataset that can report its counts
pub trait CountView {
    fn name(&self) -> &'static str;

    fn counts(&self) -> Result<GroupCounts, WarehouseError>;
}

/// View over the `processed` table
pub struct ProcessedView<'a>(pub &'a Warehouse);

/// View over the `gold` table
pub struct CuratedView<'a>(pub &'a Warehouse);

impl CountView for ProcessedView<'_> {
    fn name(&self) -> &'static str {
        "processed"
    }

    fn counts(&self) -> Result<GroupCounts, WarehouseError> {
        self.0.processed_counts()
    }
}

impl CountView for CuratedView<'_> {
    fn name(&self) -> &'static str {
        "curated"
    }

    fn counts(&self) -> Result<GroupCounts, WarehouseError> {
        self.0.curated_counts()
    }
}
