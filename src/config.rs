use crate::constants::{COMPARISON_ARTISTS, DEFAULT_TARGET_ARTIST};
use crate::error::{PulseError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// API secrets read from the process environment.
///
/// Every field is optional: a missing value disables the matching source
/// instead of failing startup.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub youtube_api_key: Option<String>,
    pub lastfm_api_key: Option<String>,
    pub lastfm_api_secret: Option<String>,
}

impl Credentials {
    /// Load `.env` (if present) and read the named secrets.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            spotify_client_id: read("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: read("SPOTIFY_CLIENT_SECRET"),
            youtube_api_key: read("YOUTUBE_API_KEY"),
            lastfm_api_key: read("LASTFM_API_KEY"),
            lastfm_api_secret: read("LASTFM_API_SECRET"),
        }
    }

    pub fn spotify(&self) -> Option<(&str, &str)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }

    pub fn youtube(&self) -> Option<&str> {
        self.youtube_api_key.as_deref()
    }

    pub fn lastfm(&self) -> Option<&str> {
        self.lastfm_api_key.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub server: ServerConfig,
    pub collection: CollectionConfig,
    pub analysis: AnalysisConfig,
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            reports_dir: PathBuf::from("./reports"),
            log_dir: PathBuf::from("./logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Timeout for the `/health` reachability probes.
    pub probe_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            probe_timeout_secs: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub target_artist: String,
    pub comparison_artists: Vec<String>,
    pub max_concurrency: usize,
    pub request_timeout_secs: u64,
    /// Pause after a failed request before the caller may issue the next one.
    pub failure_pause_secs: u64,
    pub youtube_max_results: u32,
    pub spotify_market: String,
    /// Accepted for compatibility with the weekly flow; not used to bound any call.
    pub days: u32,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            target_artist: DEFAULT_TARGET_ARTIST.to_string(),
            comparison_artists: COMPARISON_ARTISTS.iter().map(|s| s.to_string()).collect(),
            max_concurrency: 4,
            request_timeout_secs: 15,
            failure_pause_secs: 5,
            youtube_max_results: 10,
            spotify_market: "US".to_string(),
            days: 7,
        }
    }
}

impl CollectionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn failure_pause(&self) -> Duration {
        Duration::from_secs(self.failure_pause_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of weekly periods to forecast.
    pub horizon: usize,
    /// Column of `spotify_data.csv` used as the observed series. `None` means
    /// the first column of the table.
    pub value_column: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            horizon: 4,
            value_column: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_hours: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_hours: 24 * 7 }
    }
}

impl Config {
    /// Load settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let config_content = fs::read_to_string(path).map_err(|e| {
            PulseError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.collection.max_concurrency == 0 {
            return Err(PulseError::Config("collection.max_concurrency must be at least 1".into()));
        }
        if self.analysis.horizon == 0 {
            return Err(PulseError::Config("analysis.horizon must be at least 1".into()));
        }
        Ok(())
    }

    /// Defaults rooted at `root` (data/, reports/, logs/ beneath it).
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            paths: PathsConfig {
                data_dir: root.join("data"),
                reports_dir: root.join("reports"),
                log_dir: root.join("logs"),
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn blank_and_missing_values_disable_sources() {
        let env: HashMap<&str, &str> = [
            ("SPOTIFY_CLIENT_ID", "abc"),
            ("SPOTIFY_CLIENT_SECRET", "   "),
            ("YOUTUBE_API_KEY", "yt-key"),
        ]
        .into_iter()
        .collect();
        let creds = Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert!(creds.spotify().is_none());
        assert_eq!(creds.youtube(), Some("yt-key"));
        assert!(creds.lastfm().is_none());
    }

    #[test]
    fn missing_config_file_gives_defaults() {
        let cfg = Config::load(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.analysis.horizon, 4);
        assert_eq!(cfg.collection.comparison_artists.len(), 3);
        assert_eq!(cfg.collection.failure_pause_secs, 5);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[collection]\ntarget_artist = \"Aurora\"\nfailure_pause_secs = 0\n\n[analysis]\nvalue_column = \"popularity\"\n",
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.collection.target_artist, "Aurora");
        assert_eq!(cfg.collection.failure_pause_secs, 0);
        assert_eq!(cfg.collection.max_concurrency, 4);
        assert_eq!(cfg.analysis.value_column.as_deref(), Some("popularity"));
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[collection]\nmax_concurrency = 0\n").unwrap();
        assert!(matches!(Config::load(&path), Err(PulseError::Config(_))));
    }
}
