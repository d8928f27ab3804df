//! OpenID Connect discovery
//!
//! Cognito user pools publish their token endpoint in the standard
//! `.well-known/openid-configuration` document.

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Subset of the OpenID Provider Metadata used for client-credentials flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenIdConfiguration {
    /// Issuer identifier
    pub issuer: String,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// Supported grant types
    #[serde(default)]
    pub grant_types_supported: Vec<String>,

    /// Supported token endpoint auth methods
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// Supported scopes (may be string or array)
    #[serde(default, deserialize_with = "deserialize_scopes")]
    pub scopes_supported: Vec<String>,
}

fn deserialize_scopes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    match StringOrVec::deserialize(deserializer)? {
        StringOrVec::String(s) => Ok(s.split_whitespace().map(String::from).collect()),
        StringOrVec::Vec(v) => Ok(v),
    }
}

impl OpenIdConfiguration {
    /// Fetch the discovery document at `url`
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the URL when the document is
    /// unreachable, returns a non-success status, or lacks a token endpoint.
    pub async fn discover(client: &Client, url: &str) -> Result<Self> {
        debug!(url = %url, "Discovering OpenID configuration");

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Config(format!("OIDC discovery at {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Config(format!(
                "OIDC discovery at {url} failed: HTTP {}",
                response.status()
            )));
        }

        let config: Self = response.json().await.map_err(|e| {
            Error::Config(format!("OIDC discovery at {url} returned invalid metadata: {e}"))
        })?;

        if config.token_endpoint.trim().is_empty() {
            return Err(Error::Config(format!(
                "OIDC discovery at {url} did not advertise a token endpoint"
            )));
        }

        debug!(token_endpoint = %config.token_endpoint, "Discovered token endpoint");
        Ok(config)
    }

    /// Whether the provider advertises the client-credentials grant
    ///
    /// Providers that omit `grant_types_supported` are assumed to allow it.
    #[must_use]
    pub fn supports_client_credentials(&self) -> bool {
        self.grant_types_supported.is_empty()
            || self
                .grant_types_supported
                .iter()
                .any(|g| g == "client_credentials")
    }
}
