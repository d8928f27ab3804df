//! Client credential store
//!
//! Holds the OAuth2 client identity read from configuration. The store is
//! populated once; the secret never leaves this module except as a request
//! parameter and never appears in `Debug` output or logs.

use std::fmt;

use reqwest::Client;
use tracing::{debug, warn};

use super::discovery::OpenIdConfiguration;
use crate::config::{ClientAuthMethod, Config, TokenEndpointSource};
use crate::{Error, Result};

/// OAuth2 client identity used for the client-credentials grant
#[derive(Clone)]
pub struct ClientCredential {
    client_id: String,
    client_secret: String,
    token_endpoint: String,
    scope: String,
    client_auth: ClientAuthMethod,
}

impl ClientCredential {
    /// Create a credential
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_endpoint: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint: token_endpoint.into(),
            scope: scope.into(),
            client_auth: ClientAuthMethod::default(),
        }
    }

    /// Choose how client credentials are presented to the token endpoint
    #[must_use]
    pub fn with_client_auth(mut self, method: ClientAuthMethod) -> Self {
        self.client_auth = method;
        self
    }

    /// Client identifier
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Client secret
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Token endpoint URL
    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Requested scope
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Client authentication method
    #[must_use]
    pub fn client_auth(&self) -> ClientAuthMethod {
        self.client_auth
    }
}

impl fmt::Debug for ClientCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_endpoint", &self.token_endpoint)
            .field("scope", &self.scope)
            .field("client_auth", &self.client_auth)
            .finish()
    }
}

/// Loads a [`ClientCredential`] from configuration
pub struct CredentialStore;

impl CredentialStore {
    /// Validate `config` and resolve the token endpoint
    ///
    /// The endpoint is taken verbatim when configured, derived from the
    /// Cognito domain prefix when one is set, and otherwise discovered from
    /// the user pool's OpenID configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the missing field, or naming the
    /// discovery URL when discovery fails.
    pub async fn load(config: &Config) -> Result<ClientCredential> {
        config.validate()?;
        let creds = &config.credentials;

        let token_endpoint = match config.token_endpoint_source()? {
            TokenEndpointSource::Direct(url) => url,
            TokenEndpointSource::Discovery(url) => {
                let client = Client::builder()
                    .timeout(config.token.timeout)
                    .build()
                    .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;
                let discovered = OpenIdConfiguration::discover(&client, &url).await?;
                if !discovered.supports_client_credentials() {
                    warn!(
                        issuer = %discovered.issuer,
                        "Provider does not advertise the client_credentials grant"
                    );
                }
                discovered.token_endpoint
            }
        };

        debug!(
            client_id = %creds.client_id,
            token_endpoint = %token_endpoint,
            scope = %creds.scope,
            "Loaded client credential"
        );

        Ok(ClientCredential::new(
            creds.client_id.trim(),
            creds.client_secret.clone(),
            token_endpoint,
            creds.scope.trim(),
        )
        .with_client_auth(creds.client_auth))
    }
}
