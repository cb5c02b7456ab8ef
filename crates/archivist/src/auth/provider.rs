//! Bearer token acquisition and caching.
//!
//! Callers holding a plain bearer token use it as-is. App registrations
//! exchange their client id and secret at the token endpoint and cache
//! the result, refreshing shortly before the stated expiry so requests
//! never go out with a token about to lapse mid-flight.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::Result;
use crate::client::ArchivistClient;

use super::credentials::Credential;

/// Endpoint exchanging app registration credentials for a token.
pub(crate) const APPIDP_TOKEN_PATH: &str = "iam/v1/appidp/token";

/// Tokens are refreshed this long before their stated expiry.
pub(crate) const TOKEN_REFRESH_SKEW: Duration = Duration::from_secs(10);

/// Token endpoint response body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[serde(default)]
    pub(crate) expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

// Hide token value in Debug output
impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The cached exchange result for an app registration.
#[derive(Debug)]
pub(crate) struct TokenCache {
    current: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub(crate) fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Returns the cached token if it is still comfortably before expiry.
    pub(crate) async fn current(&self) -> Option<String> {
        let cached = self.current.read().await;
        cached
            .as_ref()
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.token.clone())
    }

    /// Cache a fresh exchange result and return its token.
    pub(crate) async fn store(&self, response: TokenResponse) -> String {
        let lifetime = response.expires_in.saturating_sub(TOKEN_REFRESH_SKEW.as_secs());
        let entry = CachedToken {
            token: response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        };
        let mut cached = self.current.write().await;
        *cached = Some(entry);
        response.access_token
    }
}

impl ArchivistClient {
    /// Resolve the bearer value for the next authenticated request.
    pub(crate) async fn bearer(&self) -> Result<String> {
        match self.credential() {
            Credential::Token(token) => Ok(token.as_str().to_owned()),
            Credential::AppRegistration {
                client_id,
                client_secret,
            } => {
                if let Some(token) = self.token_cache().current().await {
                    return Ok(token);
                }
                self.exchange_credentials(client_id, client_secret.as_str())
                    .await
            }
        }
    }

    /// Exchange app registration credentials for a fresh bearer token.
    #[instrument(skip(self, client_secret))]
    async fn exchange_credentials(&self, client_id: &str, client_secret: &str) -> Result<String> {
        debug!("exchanging client credentials for a bearer token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        let response: TokenResponse = self.post_form(APPIDP_TOKEN_PATH, &form).await?;

        debug!(expires_in = response.expires_in, "token issued");
        Ok(self.token_cache().store(response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(token: &str, expires_in: u64) -> TokenResponse {
        TokenResponse {
            access_token: token.to_owned(),
            expires_in,
        }
    }

    #[tokio::test]
    async fn empty_cache_yields_nothing() {
        let cache = TokenCache::new();
        assert_eq!(cache.current().await, None);
    }

    #[tokio::test]
    async fn stored_token_is_returned_until_near_expiry() {
        let cache = TokenCache::new();
        cache.store(response("tok-1", 3600)).await;
        assert_eq!(cache.current().await, Some("tok-1".to_owned()));
    }

    #[tokio::test]
    async fn token_expiring_within_the_skew_is_treated_as_stale() {
        let cache = TokenCache::new();
        // Eight seconds of nominal life is inside the ten second skew.
        cache.store(response("tok-1", 8)).await;
        assert_eq!(cache.current().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn token_goes_stale_as_the_deadline_passes() {
        let cache = TokenCache::new();
        cache.store(response("tok-1", 60)).await;
        assert_eq!(cache.current().await, Some("tok-1".to_owned()));

        // 55s in: past the 50s refresh point (60s minus the skew).
        tokio::time::advance(Duration::from_secs(55)).await;
        assert_eq!(cache.current().await, None);
    }

    #[tokio::test]
    async fn cached_token_hides_value_in_debug() {
        let cache = TokenCache::new();
        cache.store(response("super-secret-token", 3600)).await;
        let debug = format!("{:?}", cache);
        assert!(!debug.contains("super-secret-token"));
    }
}
