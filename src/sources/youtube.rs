use super::{tag_row, ArtistRole, MusicSource, SourceKind};
use crate::app::ports::HttpRequest;
use crate::constants::{YOUTUBE_API_BASE, YOUTUBE_SOURCE};
use crate::error::Result;
use crate::fetcher::HttpFetcher;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::instrument;

/// Keyword video search on the YouTube Data API; authenticated by query-string key only.
pub struct YouTubeSource {
    fetcher: HttpFetcher,
    api_key: String,
    max_results: u32,
}

impl YouTubeSource {
    pub fn new(fetcher: HttpFetcher, api_key: impl Into<String>, max_results: u32) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            max_results,
        }
    }
}

#[async_trait]
impl MusicSource for YouTubeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Youtube
    }

    #[instrument(skip(self))]
    async fn fetch_artist(&self, artist: &str) -> Result<Value> {
        let request = HttpRequest::get(format!("{}/search", YOUTUBE_API_BASE))
            .query("part", "snippet")
            .query("type", "video")
            .query("q", artist)
            .query("maxResults", self.max_results.to_string())
            .query("key", self.api_key.as_str());
        self.fetcher.try_fetch(YOUTUBE_SOURCE, request).await
    }
}

pub fn records(artist: &str, role: ArtistRole, payload: &Value) -> Vec<Value> {
    let Some(items) = payload["items"].as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|item| {
            let snippet = &item["snippet"];
            let mut row = Map::new();
            row.insert("video_id".into(), item["id"]["videoId"].clone());
            row.insert("title".into(), snippet["title"].clone());
            row.insert("channel_title".into(), snippet["channelTitle"].clone());
            row.insert("published_at".into(), snippet["publishedAt"].clone());
            row.insert("description".into(), snippet["description"].clone());
            tag_row(row, artist, role)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_items_become_rows() {
        let payload = json!({
            "kind": "youtube#searchListResponse",
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc"},
                 "snippet": {"title": "Live at Wembley", "channelTitle": "Coldplay",
                             "publishedAt": "2024-01-01T00:00:00Z", "description": "..."}}
            ]
        });
        let rows = records("Coldplay", ArtistRole::Target, &payload);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["video_id"], "abc");
        assert_eq!(rows[0]["title"], "Live at Wembley");
        assert_eq!(rows[0]["artist_query"], "Coldplay");
    }
}
