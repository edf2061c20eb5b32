use super::{tag_row, ArtistRole, MusicSource, SourceKind};
use crate::app::ports::HttpRequest;
use crate::constants::{LASTFM_API_BASE, LASTFM_SOURCE};
use crate::error::{PulseError, Result};
use crate::fetcher::HttpFetcher;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::instrument;

/// Artist info from the Last.fm (Audioscrobbler) API.
pub struct LastFmSource {
    fetcher: HttpFetcher,
    api_key: String,
}

impl LastFmSource {
    pub fn new(fetcher: HttpFetcher, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl MusicSource for LastFmSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Lastfm
    }

    #[instrument(skip(self))]
    async fn fetch_artist(&self, artist: &str) -> Result<Value> {
        let request = HttpRequest::get(LASTFM_API_BASE)
            .query("method", "artist.getinfo")
            .query("artist", artist)
            .query("api_key", self.api_key.as_str())
            .query("format", "json");
        let body = self.fetcher.try_fetch(LASTFM_SOURCE, request).await?;

        // Last.fm reports API errors inside a 200 body
        if let Some(code) = body.get("error") {
            let message = body["message"].as_str().unwrap_or("unknown error");
            return Err(PulseError::api(LASTFM_SOURCE, format!("error {}: {}", code, message)));
        }
        Ok(body)
    }
}

pub fn records(artist: &str, role: ArtistRole, payload: &Value) -> Vec<Value> {
    let info = &payload["artist"];
    if !info.is_object() {
        return Vec::new();
    }
    let tags = info["tags"]["tag"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t["name"].as_str())
                .collect::<Vec<_>>()
                .join(";")
        })
        .unwrap_or_default();

    let mut row = Map::new();
    row.insert("name".into(), info["name"].clone());
    row.insert("listeners".into(), info["stats"]["listeners"].clone());
    row.insert("playcount".into(), info["stats"]["playcount"].clone());
    row.insert("tags".into(), Value::String(tags));
    row.insert("url".into(), info["url"].clone());
    vec![tag_row(row, artist, role)]
}
