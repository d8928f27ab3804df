//! Client-credentials token exchange (RFC 6749 §4.4)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::credential::ClientCredential;
use super::token::TokenResponse;
use crate::config::ClientAuthMethod;
use crate::{Error, Result};

/// Performs one token request against the authorization server
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Exchange `credential` for a token response
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the endpoint does not answer in time,
    /// and [`Error::Auth`] for every other failure.
    async fn exchange(&self, credential: &ClientCredential) -> Result<TokenResponse>;
}

/// OAuth2 error body (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Token exchange over HTTPS
pub struct HttpTokenExchange {
    client: Client,
}

impl HttpTokenExchange {
    /// Create an exchange whose requests time out after `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Create an exchange over an existing client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange(&self, credential: &ClientCredential) -> Result<TokenResponse> {
        let endpoint = credential.token_endpoint();

        let mut params: Vec<(&str, &str)> = vec![("grant_type", "client_credentials")];
        if !credential.scope().is_empty() {
            params.push(("scope", credential.scope()));
        }
        if credential.client_auth() == ClientAuthMethod::Post {
            params.push(("client_id", credential.client_id()));
            params.push(("client_secret", credential.client_secret()));
        }

        let mut request = self.client.post(endpoint).form(&params);
        if credential.client_auth() == ClientAuthMethod::Basic {
            request = request.basic_auth(credential.client_id(), Some(credential.client_secret()));
        }

        debug!(endpoint = %endpoint, client_id = %credential.client_id(), "Requesting access token");

        let response = request
            .send()
            .await
            .map_err(|e| request_error(endpoint, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| request_error(endpoint, &e))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(OAuthErrorBody {
                    error,
                    error_description: Some(description),
                }) => format!("{error}: {description}"),
                Ok(OAuthErrorBody { error, .. }) => error,
                Err(_) if body.is_empty() => "token request rejected".to_string(),
                Err(_) => body,
            };
            return Err(Error::Auth {
                endpoint: endpoint.to_string(),
                status: Some(status.as_u16()),
                reason,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| Error::auth(endpoint, format!("malformed token response: {e}")))
    }
}

fn request_error(endpoint: &str, error: &reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        Error::auth(endpoint, format!("token request failed: {error}"))
    }
}
