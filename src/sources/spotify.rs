use super::{tag_row, ArtistRole, MusicSource, SourceKind};
use crate::app::ports::HttpRequest;
use crate::constants::{SPOTIFY_API_BASE, SPOTIFY_SOURCE};
use crate::error::{PulseError, Result};
use crate::fetcher::HttpFetcher;
use crate::session::SpotifySession;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Top tracks per artist from the Spotify Web API.
pub struct SpotifySource {
    fetcher: HttpFetcher,
    session: Arc<SpotifySession>,
    market: String,
}

impl SpotifySource {
    pub fn new(fetcher: HttpFetcher, session: Arc<SpotifySession>, market: impl Into<String>) -> Self {
        Self {
            fetcher,
            session,
            market: market.into(),
        }
    }

    async fn authorized_get(&self, request: HttpRequest) -> Result<Value> {
        let token = self.session.bearer().await?;
        let result = self
            .fetcher
            .try_fetch(
                SPOTIFY_SOURCE,
                request.header("Authorization", format!("Bearer {}", token)),
            )
            .await;
        if let Err(PulseError::Api { message, .. }) = &result {
            if message.starts_with("HTTP status 401") {
                warn!("Spotify rejected the bearer token; it will be refreshed on the next call");
                self.session.invalidate().await;
            }
        }
        result
    }

    async fn search_artist_id(&self, artist: &str) -> Result<String> {
        let request = HttpRequest::get(format!("{}/search", SPOTIFY_API_BASE))
            .query("q", artist)
            .query("type", "artist")
            .query("limit", "1");
        let body = self.authorized_get(request).await?;
        body["artists"]["items"][0]["id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| PulseError::api(SPOTIFY_SOURCE, format!("no search results for '{}'", artist)))
    }
}

#[async_trait]
impl MusicSource for SpotifySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Spotify
    }

    #[instrument(skip(self))]
    async fn fetch_artist(&self, artist: &str) -> Result<Value> {
        let id = self.search_artist_id(artist).await?;
        debug!("Resolved Spotify artist id {}", id);
        let request = HttpRequest::get(format!("{}/artists/{}/top-tracks", SPOTIFY_API_BASE, id))
            .query("market", self.market.as_str());
        self.authorized_get(request).await
    }
}

/// One row per top track, `popularity` first so the first-column forecast
/// reads a numeric series.
pub fn records(artist: &str, role: ArtistRole, payload: &Value) -> Vec<Value> {
    let Some(tracks) = payload["tracks"].as_array() else {
        return Vec::new();
    };
    tracks
        .iter()
        .map(|track| {
            let mut row = Map::new();
            row.insert("popularity".into(), track["popularity"].clone());
            row.insert("track_name".into(), track["name"].clone());
            row.insert("track_id".into(), track["id"].clone());
            row.insert("duration_ms".into(), track["duration_ms"].clone());
            row.insert("explicit".into(), track["explicit"].clone());
            row.insert("album_name".into(), track["album"]["name"].clone());
            row.insert("release_date".into(), track["album"]["release_date"].clone());
            tag_row(row, artist, role)
        })
        .collect()
}
