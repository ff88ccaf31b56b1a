use anyhow::anyhow;
use rusqlite::params;

use crate::{
    artifact::TrackRecord,
    config,
    warehouse::{
        GroupCounts, db,
        error::WarehouseError,
        schema::{columns::*, tables::*},
    },
};

/// Main structure that implements all warehouse logic
pub struct Warehouse {
    pub(crate) db: rusqlite::Connection,
}

/// Records loaded from one artifact
#[derive(Debug, Clone)]
pub struct ArtifactBatch {
    pub key: String,
    pub records: Vec<TrackRecord>,
}

impl Warehouse {
    pub fn open(config: &config::Database) -> Result<Self, WarehouseError> {
        Ok(Self::from_existing_conn(db::open(config)?))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db }
    }

    /// Replaces the whole processed layer with the given artifacts, in one transaction.
    ///
    /// Returns the number of rows loaded.
    pub fn replace_processed(&self, batches: &[ArtifactBatch]) -> Result<usize, WarehouseError> {
        let tx = self.db.unchecked_transaction()?;

        tx.execute(&format!("DELETE FROM {PROCESSED}"), [])?;

        let mut loaded = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {PROCESSED} (
                    {SOURCE_KEY}, artist, {ALBUM_NAME}, track_name, {TRACK_ID}, duration_ms,
                    explicit, album_release_date, track_popularity, album_id,
                    duration_minutes, length_category, album_track_count, album_popularity_rank
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ))?;

            for batch in batches {
                for r in &batch.records {
                    stmt.execute(params![
                        batch.key,
                        r.artist,
                        r.album_name,
                        r.track_name,
                        r.track_id,
                        r.duration_ms,
                        r.explicit,
                        r.album_release_date,
                        r.track_popularity,
                        r.album_id,
                        r.duration_minutes,
                        r.length_category,
                        r.album_track_count.map(to_sql_int).transpose()?,
                        r.album_popularity_rank.map(to_sql_int).transpose()?,
                    ])?;
                    loaded += 1;
                }
            }
        }

        tx.commit()?;
        Ok(loaded)
    }

    /// Rebuilds the curated `gold` layer from the processed layer.
    ///
    /// One row per non-empty album name with its distinct track count.
    /// Returns the number of albums written.
    pub fn refresh_gold(&self) -> Result<usize, WarehouseError> {
        let refreshed_at = chrono::Utc::now().timestamp();
        let tx = self.db.unchecked_transaction()?;

        tx.execute(&format!("DELETE FROM {GOLD}"), [])?;
        let albums = tx.execute(
            &format!(
                "INSERT INTO {GOLD} ({ALBUM_NAME}, artist, {TRACK_COUNT}, avg_duration_minutes, {REFRESHED_AT})
                 SELECT {ALBUM_NAME}, MIN(artist), COUNT(DISTINCT {TRACK_ID}),
                        ROUND(AVG(duration_minutes), 2), ?1
                 FROM {PROCESSED}
                 WHERE {ALBUM_NAME} IS NOT NULL AND {ALBUM_NAME} <> ''
                 GROUP BY {ALBUM_NAME}"
            ),
            params![refreshed_at],
        )?;

        tx.commit()?;
        Ok(albums)
    }

    /// `(row count, distinct album count)` of the processed layer
    pub fn processed_counts(&self) -> Result<GroupCounts, WarehouseError> {
        self.counts(&format!(
            "SELECT COUNT(*), COUNT(DISTINCT NULLIF({ALBUM_NAME}, '')) FROM {PROCESSED}"
        ))
    }

    /// `(summed track count, distinct album count)` of the curated layer
    pub fn curated_counts(&self) -> Result<GroupCounts, WarehouseError> {
        self.counts(&format!(
            "SELECT COALESCE(SUM({TRACK_COUNT}), 0), COUNT(DISTINCT {ALBUM_NAME}) FROM {GOLD}"
        ))
    }

    fn counts(&self, sql: &str) -> Result<GroupCounts, WarehouseError> {
        let (metric, albums): (i64, i64) = self
            .db
            .query_row(sql, [], |row| Ok((row.get(0)?, row.get(1)?)))?;

        Ok(GroupCounts {
            metric: from_sql_int(metric)?,
            albums: from_sql_int(albums)?,
        })
    }
}

fn to_sql_int(value: usize) -> Result<i64, WarehouseError> {
    i64::try_from(value)
        .map_err(|e| WarehouseError::Internal(anyhow!("count {value} does not fit the database: {e}")))
}

fn from_sql_int(value: i64) -> Result<u64, WarehouseError> {
    u64::try_from(value).map_err(|e| {
        WarehouseError::Internal(anyhow!(
            "Strange conversion error to u64 after select count: {e}"
        ))
    })
}
