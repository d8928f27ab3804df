//! Bearer tokens issued by the client-credentials exchange

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use crate::{Error, Result};

/// Lifetime assumed when the token endpoint omits `expires_in`
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Raw token endpoint response (RFC 6749 §5.1)
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type, normally `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Granted scope
    #[serde(default)]
    pub scope: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// A short-lived access token with its absolute expiry
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    access_token: String,
    token_type: String,
    scope: Option<String>,
    expires_at: Instant,
}

impl BearerToken {
    /// Create a token expiring at `expires_at`
    pub fn new(access_token: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            scope: None,
            expires_at,
        }
    }

    /// Build a token from an endpoint response received at `now`
    ///
    /// # Errors
    ///
    /// Returns an authorization error when the access token is empty or the
    /// advertised lifetime is zero or too large to represent.
    pub fn issue(response: TokenResponse, now: Instant, endpoint: &str) -> Result<Self> {
        if response.access_token.trim().is_empty() {
            return Err(Error::auth(endpoint, "token response has an empty access_token"));
        }

        let ttl = match response.expires_in {
            Some(0) => {
                return Err(Error::auth(endpoint, "token response has expires_in = 0"));
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_TOKEN_TTL,
        };

        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| Error::auth(endpoint, "token response expires_in out of range"))?;

        Ok(Self {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
            expires_at,
        })
    }

    /// The opaque token value
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Token type reported by the endpoint
    #[must_use]
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Granted scope, if reported
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Absolute expiry
    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before expiry, zero once expired
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    /// Whether the token is still usable with `margin` to spare
    #[must_use]
    pub fn is_fresh(&self, now: Instant, margin: Duration) -> bool {
        self.remaining(now) > margin
    }

    /// `Authorization` header value
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
