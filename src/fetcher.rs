use crate::app::ports::{HttpClientPort, HttpRequest};
use crate::error::{PulseError, Result};
use crate::observability::metrics;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Single-attempt JSON fetcher shared by every source.
///
/// A failed call (transport error, timeout, non-2xx status or undecodable
/// body) is logged and followed by a fixed pause before control returns to
/// the caller. There is no retry loop here; callers decide whether to call
/// again.
#[derive(Clone)]
pub struct HttpFetcher {
    http: Arc<dyn HttpClientPort>,
    timeout: Duration,
    failure_pause: Duration,
}

impl HttpFetcher {
    pub fn new(http: Arc<dyn HttpClientPort>, timeout: Duration, failure_pause: Duration) -> Self {
        Self {
            http,
            timeout,
            failure_pause,
        }
    }

    /// Fetch and decode, collapsing every failure to `None`.
    pub async fn fetch(&self, source: &'static str, request: HttpRequest) -> Option<Value> {
        self.try_fetch(source, request).await.ok()
    }

    /// Fetch and decode, returning the failure reason to the caller.
    pub async fn try_fetch(&self, source: &'static str, request: HttpRequest) -> Result<Value> {
        let url = request.url.clone();
        let request = request.timeout(self.timeout);
        let t0 = Instant::now();

        match self.send_once(source, request).await {
            Ok(value) => {
                metrics::sources::request_success(source);
                metrics::sources::request_duration(source, t0.elapsed().as_secs_f64());
                debug!(source, url = %url, "API request succeeded");
                Ok(value)
            }
            Err(e) => {
                metrics::sources::request_error(source);
                error!(source, url = %url, "API request failed: {}", e);
                if !self.failure_pause.is_zero() {
                    tokio::time::sleep(self.failure_pause).await;
                }
                Err(e)
            }
        }
    }

    async fn send_once(&self, source: &'static str, request: HttpRequest) -> Result<Value> {
        let resp = tokio::time::timeout(self.timeout, self.http.send(request))
            .await
            .map_err(|_| PulseError::Timeout(self.timeout.as_secs()))?
            .map_err(|message| PulseError::api(source, message))?;

        if !resp.is_success() {
            let snippet: String = String::from_utf8_lossy(&resp.bytes).chars().take(200).collect();
            return Err(PulseError::api(
                source,
                format!("HTTP status {}: {}", resp.status, snippet),
            ));
        }
        Ok(serde_json::from_slice(&resp.bytes)?)
    }
}
