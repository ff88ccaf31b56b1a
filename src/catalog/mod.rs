//! Music catalog access: the API seam and the fetcher flattening it into rows

pub mod client;
pub mod error;

use serde::Deserialize;

use crate::domain::track::RawRow;

use error::CatalogError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlbumSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackSummary {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub explicit: Option<bool>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

/// Read-only view of the upstream catalog
pub trait CatalogApi {
    fn artist_name(&self, artist_id: &str) -> Result<String, CatalogError>;

    fn list_artist_albums(&self, artist_id: &str) -> Result<Vec<AlbumSummary>, CatalogError>;

    fn list_album_tracks(&self, album_id: &str) -> Result<Vec<TrackSummary>, CatalogError>;
}

/// Flattens every track of every album of every artist into raw rows.
///
/// Rows come out in artist, album, track order exactly as the catalog lists them.
pub fn fetch_rows<C: CatalogApi + ?Sized>(
    api: &C,
    artist_ids: &[String],
) -> Result<Vec<RawRow>, CatalogError> {
    if artist_ids.is_empty() {
        return Err(CatalogError::Configuration(
            "no artist ids to fetch".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for artist_id in artist_ids {
        let artist = api.artist_name(artist_id)?;
        let albums = api.list_artist_albums(artist_id)?;
        let before = rows.len();

        for album in &albums {
            let tracks = api.list_album_tracks(&album.id)?;
            rows.extend(tracks.into_iter().map(|track| RawRow {
                artist: artist.clone(),
                album_name: Some(album.name.clone()),
                track_name: track.name,
                track_id: track.id,
                duration_ms: track.duration_ms.map(|ms| ms.to_string()),
                explicit: track.explicit,
                album_release_date: album.release_date.clone(),
                track_popularity: track.popularity,
                album_id: Some(album.id.clone()),
            }));
        }

        log::info!(
            "artist {artist} ({artist_id}): {} albums, {} tracks",
            albums.len(),
            rows.len() - before
        );
    }
    Ok(rows)
}
