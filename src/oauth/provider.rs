//! Token provider
//!
//! Caches one bearer token and refreshes it on demand. Concurrent callers
//! that find the cache stale queue on a single refresh lock; the first one
//! performs the exchange and the rest pick up its result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::credential::ClientCredential;
use super::exchange::{HttpTokenExchange, TokenExchange};
use super::token::BearerToken;
use crate::config::TokenConfig;
use crate::failsafe::{self, Operation, RetryDecision};
use crate::{Error, Result};

/// Default refresh margin before expiry
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Hands out valid bearer tokens for one client credential
pub struct TokenProvider {
    credential: ClientCredential,
    exchange: Arc<dyn TokenExchange>,
    refresh_margin: Duration,
    current: RwLock<Option<Arc<BearerToken>>>,
    refresh_lock: Mutex<()>,
    exchanges: AtomicU64,
}

impl TokenProvider {
    /// Create a provider over an arbitrary exchange
    pub fn new(credential: ClientCredential, exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            credential,
            exchange,
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Create a provider exchanging over HTTPS with the configured timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(credential: ClientCredential, config: &TokenConfig) -> Result<Self> {
        let exchange = HttpTokenExchange::new(config.timeout)?;
        Ok(Self::new(credential, Arc::new(exchange)).with_refresh_margin(config.refresh_margin))
    }

    /// Refresh tokens this long before they expire
    #[must_use]
    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Credential this provider exchanges
    #[must_use]
    pub fn credential(&self) -> &ClientCredential {
        &self.credential
    }

    /// Return a token valid for at least the refresh margin
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] when the exchange fails. A previously cached
    /// token is left in place.
    pub async fn get_token(&self) -> Result<Arc<BearerToken>> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Whoever held the lock before us may already have refreshed
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let token = Arc::new(self.exchange_with_retry().await?);
        *self.current.write() = Some(Arc::clone(&token));
        Ok(token)
    }

    /// Drop the cached token so the next `get_token` exchanges again
    pub fn invalidate(&self) {
        if self.current.write().take().is_some() {
            debug!(endpoint = %self.credential.token_endpoint(), "Cached token invalidated");
        }
    }

    /// Drop the cached token only if it is the one the gateway rejected
    ///
    /// Returns `true` if the cache was cleared. When several requests fail
    /// with the same token, only the first clears it; the rest reuse the
    /// replacement.
    pub fn invalidate_token(&self, rejected: &BearerToken) -> bool {
        let mut current = self.current.write();
        if current
            .as_deref()
            .is_some_and(|t| t.access_token() == rejected.access_token())
        {
            *current = None;
            debug!(endpoint = %self.credential.token_endpoint(), "Rejected token invalidated");
            true
        } else {
            false
        }
    }

    /// Cached token, fresh or not
    #[must_use]
    pub fn cached(&self) -> Option<Arc<BearerToken>> {
        self.current.read().clone()
    }

    /// Number of token requests sent so far, retries included
    #[must_use]
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    fn fresh_token(&self) -> Option<Arc<BearerToken>> {
        let now = Instant::now();
        self.current
            .read()
            .as_ref()
            .filter(|t| t.is_fresh(now, self.refresh_margin))
            .cloned()
    }

    async fn exchange_with_retry(&self) -> Result<BearerToken> {
        let endpoint = self.credential.token_endpoint();
        let mut attempt = 1;

        loop {
            self.exchanges.fetch_add(1, Ordering::Relaxed);
            let result = self
                .exchange
                .exchange(&self.credential)
                .await
                .and_then(|response| BearerToken::issue(response, Instant::now(), endpoint));

            match result {
                Ok(token) => {
                    info!(
                        endpoint = %endpoint,
                        expires_in_secs = token.remaining(Instant::now()).as_secs(),
                        "Obtained access token"
                    );
                    return Ok(token);
                }
                Err(e) => match failsafe::decide(Operation::TokenExchange, &e, attempt) {
                    RetryDecision::Retry => {
                        warn!(endpoint = %endpoint, attempt, error = %e, "Token request failed, retrying");
                        attempt += 1;
                    }
                    RetryDecision::RefreshAndRetry | RetryDecision::Fail => {
                        warn!(endpoint = %endpoint, error = %e, "Token request failed");
                        return Err(as_auth_error(e, endpoint));
                    }
                },
            }
        }
    }
}

fn as_auth_error(error: Error, endpoint: &str) -> Error {
    match error {
        Error::Auth { .. } => error,
        Error::Timeout { .. } => Error::auth(endpoint, "token request timed out"),
        other => Error::auth(endpoint, other.to_string()),
    }
}
