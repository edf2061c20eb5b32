use crate::app::ports::HttpRequest;
use crate::constants::{SPOTIFY_SOURCE, SPOTIFY_TOKEN_URL};
use crate::error::{PulseError, Result};
use crate::fetcher::HttpFetcher;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Tokens are treated as expired this long before the server says they are.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct BearerToken {
    pub access_token: String,
    expires_at: Instant,
}

impl BearerToken {
    fn new(access_token: String, expires_in: Duration) -> Self {
        Self {
            access_token,
            expires_at: Instant::now() + expires_in.saturating_sub(EXPIRY_SKEW),
        }
    }

    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Client-credentials session for the Spotify Web API.
///
/// Holds the current bearer token and refreshes it on demand once it is
/// within [`EXPIRY_SKEW`] of expiring. Concurrent callers queue on the token
/// lock, so at most one exchange is in flight.
pub struct SpotifySession {
    fetcher: HttpFetcher,
    client_id: String,
    client_secret: String,
    token_url: String,
    token: Mutex<Option<BearerToken>>,
}

impl SpotifySession {
    pub fn new(fetcher: HttpFetcher, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            fetcher,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: SPOTIFY_TOKEN_URL.to_string(),
            token: Mutex::new(None),
        }
    }

    /// Current access token, exchanging credentials first if needed.
    pub async fn bearer(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.access_token.clone());
        }

        debug!("Spotify token missing or expired; requesting a new one");
        let token = self.exchange().await?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    async fn exchange(&self) -> Result<BearerToken> {
        let request = HttpRequest::post(&self.token_url)
            .basic_auth(&self.client_id, &self.client_secret)
            .form("grant_type", "client_credentials");
        let body = self
            .fetcher
            .try_fetch(SPOTIFY_SOURCE, request)
            .await
            .map_err(|e| PulseError::Auth(e.to_string()))?;

        let access_token = body["access_token"]
            .as_str()
            .ok_or_else(|| PulseError::Auth("token response missing access_token".into()))?
            .to_string();
        let expires_in = body["expires_in"].as_u64().unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        info!("🔑 Acquired Spotify bearer token (expires in {}s)", expires_in);

        Ok(BearerToken::new(access_token, Duration::from_secs(expires_in)))
    }
}
