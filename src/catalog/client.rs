//! Blocking HTTP client for the catalog API.
//!
//! Authenticates once with the client-credentials grant and sends the bearer
//! token with every listing request.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    catalog::{AlbumSummary, CatalogApi, TrackSummary, error::CatalogError},
    config::CatalogConfig,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TRACK_PAGE_SIZE: u32 = 50;

pub struct HttpCatalogClient {
    client: Client,
    api_base: String,
    album_limit: u32,
    token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ArtistResponse {
    name: String,
}

#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

impl HttpCatalogClient {
    /// Exchanges the client credentials for an access token
    pub fn connect(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        log::debug!("requesting catalog token from {}", config.token_url);
        let response = client
            .post(&config.token_url)
            .basic_auth(&config.client_id, Some(&config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(CatalogError::Authentication {
                status: status.as_u16(),
                message,
            });
        }

        let token = parse_token(&response.text()?, status.as_u16())?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            album_limit: config.album_limit,
            token,
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        log::debug!("GET {url}");
        let response = self.client.get(url).bearer_auth(&self.token).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json()?)
    }
}

fn parse_token(body: &str, status: u16) -> Result<String, CatalogError> {
    let token = serde_json::from_str::<TokenResponse>(body)
        .ok()
        .and_then(|t| t.access_token)
        .filter(|t| !t.is_empty());

    token.ok_or_else(|| CatalogError::Authentication {
        status,
        message: format!("token response missing access_token: {body}"),
    })
}

impl CatalogApi for HttpCatalogClient {
    fn artist_name(&self, artist_id: &str) -> Result<String, CatalogError> {
        let artist: ArtistResponse =
            self.get_json(&format!("{}/artists/{artist_id}", self.api_base))?;
        Ok(artist.name)
    }

    fn list_artist_albums(&self, artist_id: &str) -> Result<Vec<AlbumSummary>, CatalogError> {
        let url = format!(
            "{}/artists/{artist_id}/albums?limit={}",
            self.api_base, self.album_limit
        );
        let page: Page<AlbumSummary> = self.get_json(&url)?;
        Ok(page.items)
    }

    fn list_album_tracks(&self, album_id: &str) -> Result<Vec<TrackSummary>, CatalogError> {
        let mut url = Some(format!(
            "{}/albums/{album_id}/tracks?limit={TRACK_PAGE_SIZE}",
            self.api_base
        ));
        let mut tracks = Vec::new();

        while let Some(current) = url {
            let page: Page<TrackSummary> = self.get_json(&current)?;
            tracks.extend(page.items);
            url = page.next;
        }
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::{TcpListener, TcpStream},
        thread::JoinHandle,
    };

    use crate::{
        catalog::{AlbumSummary, CatalogApi, TrackSummary, error::CatalogError},
        config::CatalogConfig,
    };

    use super::{HttpCatalogClient, Page, parse_token};

    /// Reads one request, returns its request line and headers
    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        let head_end = loop {
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "connection closed mid request");
            data.extend_from_slice(&buf[..n]);
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&data[..head_end]).to_string();
        let body_len = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        while data.len() < head_end + body_len {
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "connection closed mid body");
            data.extend_from_slice(&buf[..n]);
        }
        head
    }

    /// Answers one connection per canned `(status, body)` response, in order.
    /// The join handle yields the request heads it saw.
    fn serve(
        responses: impl FnOnce(&str) -> Vec<(&'static str, String)>,
    ) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let responses = responses(&base);

        let handle = std::thread::spawn(move || {
            let mut heads = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                heads.push(read_request(&mut stream));
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
            heads
        });
        (base, handle)
    }

    fn config(base: &str) -> CatalogConfig {
        CatalogConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            token_url: format!("{base}/token"),
            api_base: format!("{base}/v1"),
            album_limit: 20,
        }
    }

    fn token() -> (&'static str, String) {
        ("200 OK", r#"{"access_token":"abc","token_type":"Bearer"}"#.to_string())
    }

    #[test]
    fn rejected_credentials_are_an_authentication_error() {
        let (base, server) = serve(|_| {
            vec![("401 Unauthorized", r#"{"error":"invalid_client"}"#.to_string())]
        });

        let err = HttpCatalogClient::connect(&config(&base)).err().unwrap();

        assert!(matches!(err, CatalogError::Authentication { status: 401, .. }));
        assert!(!err.is_retryable());
        let heads = server.join().unwrap();
        assert!(heads[0].starts_with("POST /token "));
        assert!(heads[0].to_ascii_lowercase().contains("authorization: basic "));
    }

    #[test]
    fn server_error_on_listing_is_retryable() {
        let (base, server) = serve(|_| {
            vec![token(), ("500 Internal Server Error", "{}".to_string())]
        });

        let client = HttpCatalogClient::connect(&config(&base)).unwrap();
        let err = client.artist_name("x").unwrap_err();

        assert!(matches!(err, CatalogError::Status { status: 500, .. }));
        assert!(err.is_retryable());
        let heads = server.join().unwrap();
        assert!(heads[1].starts_with("GET /v1/artists/x "));
        assert!(heads[1].to_ascii_lowercase().contains("authorization: bearer abc"));
    }

    #[test]
    fn track_listing_follows_next_pages() {
        let (base, server) = serve(|base| {
            vec![
                token(),
                (
                    "200 OK",
                    format!(
                        r#"{{"items":[{{"id":"t1","name":"One","duration_ms":180000}}],"next":"{base}/v1/albums/al1/tracks?offset=50&limit=50"}}"#
                    ),
                ),
                (
                    "200 OK",
                    r#"{"items":[{"id":"t2","name":"Two","duration_ms":200000}],"next":null}"#
                        .to_string(),
                ),
            ]
        });

        let client = HttpCatalogClient::connect(&config(&base)).unwrap();
        let tracks = client.list_album_tracks("al1").unwrap();

        let ids: Vec<_> = tracks.iter().map(|t| t.id.as_deref().unwrap()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        let heads = server.join().unwrap();
        assert!(heads[1].starts_with("GET /v1/albums/al1/tracks?limit=50 "));
        assert!(heads[2].starts_with("GET /v1/albums/al1/tracks?offset=50&limit=50 "));
    }

    #[test]
    fn token_is_extracted() {
        let body = r#"{"access_token":"abc","token_type":"Bearer","expires_in":3600}"#;
        assert_eq!(parse_token(body, 200).unwrap(), "abc");
    }

    #[test]
    fn missing_token_is_an_authentication_error() {
        for body in [r#"{"token_type":"Bearer"}"#, r#"{"access_token":""}"#, "not json"] {
            let err = parse_token(body, 200).unwrap_err();
            assert!(matches!(err, CatalogError::Authentication { status: 200, .. }));
        }
    }

    #[test]
    fn album_page_parses() -> anyhow::Result<()> {
        let body = r#"{
            "items": [
                {"id": "album_1", "name": "Album One", "release_date": "2020-01-01", "album_type": "album"},
                {"id": "album_2", "name": "Album Two"}
            ],
            "next": null
        }"#;

        let page: Page<AlbumSummary> = serde_json::from_str(body)?;

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].release_date.as_deref(), Some("2020-01-01"));
        assert_eq!(page.items[1].release_date, None);
        assert!(page.next.is_none());
        Ok(())
    }

    #[test]
    fn track_page_parses_with_next_link() -> anyhow::Result<()> {
        let body = r#"{
            "items": [
                {"id": "track_1", "name": "Song One", "duration_ms": 180000, "explicit": false},
                {"id": null, "name": "Local File", "duration_ms": 240000, "explicit": true}
            ],
            "next": "https://api.example.com/v1/albums/album_1/tracks?offset=50&limit=50"
        }"#;

        let page: Page<TrackSummary> = serde_json::from_str(body)?;

        assert_eq!(page.items[0].id.as_deref(), Some("track_1"));
        assert_eq!(page.items[0].duration_ms, Some(180000));
        assert_eq!(page.items[1].id, None);
        assert_eq!(page.items[1].explicit, Some(true));
        assert!(page.next.is_some());
        Ok(())
    }
}
