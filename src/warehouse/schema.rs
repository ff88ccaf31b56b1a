use rusqlite::Connection;

pub mod tables {
    pub const PROCESSED: &str = "processed";
    pub const GOLD: &str = "gold";

    #[cfg(test)]
    pub const ALL_TABLES: &[&str] = &[PROCESSED, GOLD];
}

pub mod columns {
    pub const SOURCE_KEY: &str = "source_key";
    pub const ALBUM_NAME: &str = "album_name";
    pub const TRACK_ID: &str = "track_id";
    pub const TRACK_COUNT: &str = "track_count";
    pub const REFRESHED_AT: &str = "refreshed_at";
}

pub use columns::*;
pub use tables::*;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS processed (
    source_key TEXT NOT NULL,
    artist TEXT NOT NULL,
    album_name TEXT,
    track_name TEXT NOT NULL,
    track_id TEXT NOT NULL,
    duration_ms TEXT,
    explicit INTEGER,
    album_release_date TEXT,
    track_popularity INTEGER,
    album_id TEXT,
    duration_minutes REAL,
    length_category TEXT,
    album_track_count INTEGER,
    album_popularity_rank INTEGER
);

CREATE TABLE IF NOT EXISTS gold (
    album_name TEXT PRIMARY KEY,
    artist TEXT NOT NULL,
    track_count INTEGER NOT NULL,
    avg_duration_minutes REAL,
    refreshed_at INTEGER NOT NULL
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
