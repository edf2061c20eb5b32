//! External music-data sources.
//!
//! Each source answers one question per artist (top tracks, video search,
//! artist info) and knows how to turn the payloads it returned into flat
//! rows for the persistence step.

pub mod lastfm;
pub mod spotify;
pub mod youtube;

use crate::constants::{LASTFM_DATA_FILE, LASTFM_SOURCE, SPOTIFY_DATA_FILE, SPOTIFY_SOURCE, YOUTUBE_DATA_FILE, YOUTUBE_SOURCE};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub use lastfm::LastFmSource;
pub use spotify::SpotifySource;
pub use youtube::YouTubeSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Spotify,
    Youtube,
    Lastfm,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Spotify, SourceKind::Youtube, SourceKind::Lastfm];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Spotify => SPOTIFY_SOURCE,
            SourceKind::Youtube => YOUTUBE_SOURCE,
            SourceKind::Lastfm => LASTFM_SOURCE,
        }
    }

    pub fn data_file(&self) -> &'static str {
        match self {
            SourceKind::Spotify => SPOTIFY_DATA_FILE,
            SourceKind::Youtube => YOUTUBE_DATA_FILE,
            SourceKind::Lastfm => LASTFM_DATA_FILE,
        }
    }

    /// Flatten one artist's payload into table rows.
    pub fn records(&self, artist: &str, role: ArtistRole, payload: &Value) -> Vec<Value> {
        match self {
            SourceKind::Spotify => spotify::records(artist, role, payload),
            SourceKind::Youtube => youtube::records(artist, role, payload),
            SourceKind::Lastfm => lastfm::records(artist, role, payload),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a row belongs to the analysed artist or the comparison set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtistRole {
    Target,
    Comparison,
}

impl ArtistRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtistRole::Target => "target",
            ArtistRole::Comparison => "comparison",
        }
    }
}

/// Core trait that every music-data source implements
#[async_trait]
pub trait MusicSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch this source's payload for one artist.
    async fn fetch_artist(&self, artist: &str) -> Result<Value>;
}

/// Shared row prefix: which query produced the row.
pub(crate) fn tag_row(mut row: serde_json::Map<String, Value>, artist: &str, role: ArtistRole) -> Value {
    row.insert("artist_query".into(), Value::String(artist.to_string()));
    row.insert("artist_role".into(), Value::String(role.as_str().to_string()));
    Value::Object(row)
}
