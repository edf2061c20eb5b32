use crate::app::ports::HttpClientPort;
use crate::config::{CollectionConfig, Credentials};
use crate::error::{PulseError, Result};
use crate::fetcher::HttpFetcher;
use crate::session::SpotifySession;
use crate::sources::{ArtistRole, LastFmSource, MusicSource, SourceKind, SpotifySource, YouTubeSource};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Requests a single (source, artist) job may issue: token, search, lookup.
const MAX_REQUESTS_PER_JOB: u32 = 3;

/// One artist's slot in a source bundle. A failed fetch keeps the slot with
/// `payload: None`.
#[derive(Debug, Clone, Serialize)]
pub struct ArtistPayload {
    pub name: String,
    pub payload: Option<Value>,
}

/// Everything one source returned for the target and comparison artists.
#[derive(Debug, Clone, Serialize)]
pub struct SourceBundle {
    pub target_artist: ArtistPayload,
    pub comparison_artists: BTreeMap<String, Option<Value>>,
}

/// How a source fared during one collection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Collected {
        fetched: usize,
        failed: usize,
        errors: Vec<String>,
    },
    Unavailable {
        reason: String,
    },
}

impl SourceStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, SourceStatus::Collected { .. })
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceStatus::Collected { fetched, failed, .. } => {
                write!(f, "collected ({} fetched, {} failed)", fetched, failed)
            }
            SourceStatus::Unavailable { reason } => write!(f, "unavailable ({})", reason),
        }
    }
}

/// Result of one collection run; always holds a slot for every source.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionBundle {
    pub target_artist: String,
    pub collected_at: DateTime<Utc>,
    pub sources: BTreeMap<SourceKind, Option<SourceBundle>>,
    pub status: BTreeMap<SourceKind, SourceStatus>,
}

impl CollectionBundle {
    pub fn source(&self, kind: SourceKind) -> Option<&SourceBundle> {
        self.sources.get(&kind).and_then(|s| s.as_ref())
    }

    /// Flat rows for the persistence step; `None` when the source was unavailable.
    pub fn records(&self, kind: SourceKind) -> Option<Value> {
        let bundle = self.source(kind)?;
        let mut rows = Vec::new();
        if let Some(payload) = &bundle.target_artist.payload {
            rows.extend(kind.records(&bundle.target_artist.name, ArtistRole::Target, payload));
        }
        for (artist, payload) in &bundle.comparison_artists {
            if let Some(payload) = payload {
                rows.extend(kind.records(artist, ArtistRole::Comparison, payload));
            }
        }
        Some(Value::Array(rows))
    }

    /// Write the bundle as pretty JSON, replacing any previous run.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

struct FetchJob {
    source: Arc<dyn MusicSource>,
    artist: String,
    role: ArtistRole,
}

/// Collects per-artist payloads from every configured source.
///
/// All (source, artist) pairs are fetched concurrently, bounded by
/// `max_concurrency`, with each pair given `call_timeout` to finish.
pub struct DataCollector {
    sources: BTreeMap<SourceKind, Arc<dyn MusicSource>>,
    unavailable: BTreeMap<SourceKind, String>,
    comparison_artists: Vec<String>,
    max_concurrency: usize,
    call_timeout: Duration,
}

impl DataCollector {
    pub fn new(
        sources: Vec<Arc<dyn MusicSource>>,
        comparison_artists: Vec<String>,
        max_concurrency: usize,
        call_timeout: Duration,
    ) -> Self {
        let sources: BTreeMap<SourceKind, Arc<dyn MusicSource>> =
            sources.into_iter().map(|s| (s.kind(), s)).collect();
        let unavailable = SourceKind::ALL
            .iter()
            .filter(|k| !sources.contains_key(k))
            .map(|k| (*k, "not configured".to_string()))
            .collect();
        Self {
            sources,
            unavailable,
            comparison_artists,
            max_concurrency: max_concurrency.max(1),
            call_timeout,
        }
    }

    /// Build the sources the credentials allow; the rest are marked unavailable.
    pub fn from_config(
        credentials: &Credentials,
        config: &CollectionConfig,
        http: Arc<dyn HttpClientPort>,
    ) -> Self {
        let fetcher = HttpFetcher::new(http, config.request_timeout(), config.failure_pause());
        let mut sources: Vec<Arc<dyn MusicSource>> = Vec::new();
        let mut unavailable = BTreeMap::new();

        match credentials.spotify() {
            Some((id, secret)) => {
                let session = Arc::new(SpotifySession::new(fetcher.clone(), id, secret));
                sources.push(Arc::new(SpotifySource::new(
                    fetcher.clone(),
                    session,
                    config.spotify_market.as_str(),
                )));
            }
            None => {
                unavailable.insert(
                    SourceKind::Spotify,
                    "missing SPOTIFY_CLIENT_ID or SPOTIFY_CLIENT_SECRET".to_string(),
                );
            }
        }
        match credentials.youtube() {
            Some(key) => sources.push(Arc::new(YouTubeSource::new(
                fetcher.clone(),
                key,
                config.youtube_max_results,
            ))),
            None => {
                unavailable.insert(SourceKind::Youtube, "missing YOUTUBE_API_KEY".to_string());
            }
        }
        match credentials.lastfm() {
            Some(key) => sources.push(Arc::new(LastFmSource::new(fetcher.clone(), key))),
            None => {
                unavailable.insert(SourceKind::Lastfm, "missing LASTFM_API_KEY".to_string());
            }
        }

        let per_request = config.request_timeout() + config.failure_pause();
        let mut collector = Self::new(
            sources,
            config.comparison_artists.clone(),
            config.max_concurrency,
            per_request * MAX_REQUESTS_PER_JOB,
        );
        collector.unavailable.extend(unavailable);
        collector
    }

    pub fn configured_sources(&self) -> Vec<SourceKind> {
        self.sources.keys().copied().collect()
    }

    /// Query every configured source for `target_artist` and the comparison set.
    ///
    /// Never fails: unconfigured sources get a `None` slot, failed artist
    /// fetches get a `None` payload. `days` is recorded in the log only.
    #[instrument(skip(self))]
    pub async fn collect_all_data(&self, target_artist: &str, days: u32) -> CollectionBundle {
        info!("📡 Collecting data for the past {} days", days);

        let mut jobs = Vec::new();
        for source in self.sources.values() {
            jobs.push(FetchJob {
                source: source.clone(),
                artist: target_artist.to_string(),
                role: ArtistRole::Target,
            });
            for artist in &self.comparison_artists {
                jobs.push(FetchJob {
                    source: source.clone(),
                    artist: artist.clone(),
                    role: ArtistRole::Comparison,
                });
            }
        }

        let call_timeout = self.call_timeout;
        let results: Vec<(SourceKind, String, ArtistRole, Result<Value>)> = stream::iter(jobs)
            .map(|job| async move {
                let kind = job.source.kind();
                let result = match tokio::time::timeout(call_timeout, job.source.fetch_artist(&job.artist)).await {
                    Ok(r) => r,
                    Err(_) => Err(PulseError::Timeout(call_timeout.as_secs())),
                };
                (kind, job.artist, job.role, result)
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut bundle = CollectionBundle {
            target_artist: target_artist.to_string(),
            collected_at: Utc::now(),
            sources: SourceKind::ALL.iter().map(|k| (*k, None)).collect(),
            status: BTreeMap::new(),
        };
        for (kind, reason) in &self.unavailable {
            warn!(source = %kind, "Source unavailable: {}", reason);
            bundle.status.insert(*kind, SourceStatus::Unavailable { reason: reason.clone() });
        }

        for kind in self.sources.keys() {
            bundle.sources.insert(
                *kind,
                Some(SourceBundle {
                    target_artist: ArtistPayload {
                        name: target_artist.to_string(),
                        payload: None,
                    },
                    comparison_artists: self
                        .comparison_artists
                        .iter()
                        .map(|a| (a.clone(), None))
                        .collect(),
                }),
            );
            bundle.status.insert(
                *kind,
                SourceStatus::Collected {
                    fetched: 0,
                    failed: 0,
                    errors: Vec::new(),
                },
            );
        }

        for (kind, artist, role, result) in results {
            let payload = match result {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(source = %kind, artist = %artist, "Fetch failed: {}", e);
                    if let Some(SourceStatus::Collected { errors, .. }) = bundle.status.get_mut(&kind) {
                        errors.push(format!("{}: {}", artist, e));
                    }
                    None
                }
            };
            if let Some(SourceStatus::Collected { fetched, failed, .. }) = bundle.status.get_mut(&kind) {
                if payload.is_some() {
                    *fetched += 1;
                } else {
                    *failed += 1;
                }
            }
            if let Some(Some(sb)) = bundle.sources.get_mut(&kind) {
                match role {
                    ArtistRole::Target => sb.target_artist.payload = payload,
                    ArtistRole::Comparison => {
                        sb.comparison_artists.insert(artist, payload);
                    }
                }
            }
        }

        info!(
            "✅ Collection finished: {} of {} sources configured",
            self.sources.len(),
            SourceKind::ALL.len()
        );
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeSource {
        kind: SourceKind,
        fail_for: Option<&'static str>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeSource {
        fn new(kind: SourceKind, fail_for: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail_for,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MusicSource for FakeSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn fetch_artist(&self, artist: &str) -> Result<Value> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_for == Some(artist) {
                return Err(PulseError::api(self.kind.as_str(), "boom"));
            }
            Ok(json!({"items": [{"id": {"videoId": artist}, "snippet": {"title": artist}}]}))
        }
    }

    fn comparisons() -> Vec<String> {
        vec!["Coldplay".into(), "Imagine Dragons".into(), "Maroon 5".into()]
    }

    #[tokio::test]
    async fn bundle_has_every_source_key_even_when_nothing_is_configured() {
        let collector = DataCollector::new(Vec::new(), comparisons(), 4, Duration::from_secs(1));
        let bundle = collector.collect_all_data("Nova Sound", 7).await;

        assert_eq!(bundle.sources.len(), 3);
        for kind in SourceKind::ALL {
            assert!(bundle.source(kind).is_none());
            assert!(bundle.records(kind).is_none());
            assert!(!bundle.status[&kind].is_available());
        }
    }

    #[tokio::test]
    async fn missing_credentials_disable_sources_without_calls() {
        struct NoNetwork;
        #[async_trait]
        impl HttpClientPort for NoNetwork {
            async fn send(
                &self,
                _r: crate::app::ports::HttpRequest,
            ) -> std::result::Result<crate::app::ports::HttpResponse, String> {
                panic!("no request expected");
            }
        }
        let creds = Credentials::from_lookup(|_| None);
        let collector = DataCollector::from_config(&creds, &CollectionConfig::default(), Arc::new(NoNetwork));
        assert!(collector.configured_sources().is_empty());

        let bundle = collector.collect_all_data("Nova Sound", 7).await;
        match &bundle.status[&SourceKind::Spotify] {
            SourceStatus::Unavailable { reason } => assert!(reason.contains("SPOTIFY_CLIENT_ID")),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_artist_keeps_its_slot_with_no_payload() {
        let yt = FakeSource::new(SourceKind::Youtube, Some("Maroon 5"));
        let collector = DataCollector::new(vec![yt], comparisons(), 2, Duration::from_secs(1));
        let bundle = collector.collect_all_data("Nova Sound", 7).await;

        let sb = bundle.source(SourceKind::Youtube).unwrap();
        assert!(sb.target_artist.payload.is_some());
        assert!(sb.comparison_artists.contains_key("Maroon 5"));
        assert!(sb.comparison_artists["Maroon 5"].is_none());
        assert!(sb.comparison_artists["Coldplay"].is_some());

        match &bundle.status[&SourceKind::Youtube] {
            SourceStatus::Collected { fetched, failed, errors } => {
                assert_eq!((*fetched, *failed), (3, 1));
                assert!(errors[0].starts_with("Maroon 5"));
            }
            other => panic!("unexpected status {:?}", other),
        }

        let rows = bundle.records(SourceKind::Youtube).unwrap();
        assert_eq!(rows.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fan_out_respects_concurrency_bound() {
        let yt = FakeSource::new(SourceKind::Youtube, None);
        let lf = FakeSource::new(SourceKind::Lastfm, None);
        let collector = DataCollector::new(vec![yt.clone(), lf.clone()], comparisons(), 2, Duration::from_secs(1));
        collector.collect_all_data("Nova Sound", 7).await;

        assert!(yt.peak.load(Ordering::SeqCst) <= 2);
        assert!(lf.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn slow_fetches_are_cut_off_by_the_call_timeout() {
        struct Slow;
        #[async_trait]
        impl MusicSource for Slow {
            fn kind(&self) -> SourceKind {
                SourceKind::Lastfm
            }
            async fn fetch_artist(&self, _artist: &str) -> Result<Value> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Value::Null)
            }
        }
        let collector = DataCollector::new(vec![Arc::new(Slow)], Vec::new(), 1, Duration::from_millis(20));
        let bundle = collector.collect_all_data("Nova Sound", 7).await;
        let sb = bundle.source(SourceKind::Lastfm).unwrap();
        assert!(sb.target_artist.payload.is_none());
    }
}
