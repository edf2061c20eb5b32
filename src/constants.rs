//! Source, file and artist constants shared across the crate.

// Source names (bundle keys, CSV file prefixes, health report keys)
pub const SPOTIFY_SOURCE: &str = "spotify";
pub const YOUTUBE_SOURCE: &str = "youtube";
pub const LASTFM_SOURCE: &str = "lastfm";

// Data directory layout
pub const SPOTIFY_DATA_FILE: &str = "spotify_data.csv";
pub const YOUTUBE_DATA_FILE: &str = "youtube_data.csv";
pub const LASTFM_DATA_FILE: &str = "lastfm_data.csv";
pub const FORECAST_FILE: &str = "genre_forecast.csv";
pub const BUNDLE_FILE: &str = "collection_bundle.json";

// Reports directory layout
pub const DEFAULT_REPORT_FILE: &str = "weekly_genre_pulse.md";
pub const ARTIST_REPORT_SUFFIX: &str = "_genre_pulse.md";

pub const LOG_FILE_NAME: &str = "genre_analysis.log";

pub const DEFAULT_TARGET_ARTIST: &str = "Nova Sound";

/// Fixed reference set every target artist is compared against.
pub const COMPARISON_ARTISTS: [&str; 3] = ["Coldplay", "Imagine Dragons", "Maroon 5"];

// External endpoints
pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const LASTFM_API_BASE: &str = "https://ws.audioscrobbler.com/2.0/";
