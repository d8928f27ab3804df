//! Configuration management

use std::{env, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// Prefix for nested environment overrides (`M2M_GATEWAY_GATEWAY__URL`)
pub const ENV_PREFIX: &str = "M2M_GATEWAY_";

const DEFAULT_REGION: &str = "us-east-1";

/// Flat environment variables understood for compatibility with existing
/// deployments, and the config path each one sets.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("AWS_REGION", "region"),
    ("AGENT_NAME", "agent.name"),
    ("MODEL_ID", "agent.model_id"),
    ("COGNITO_USER_POOL_ID", "credentials.user_pool_id"),
    ("COGNITO_DOMAIN_PREFIX", "credentials.domain_prefix"),
    ("COGNITO_CLIENT_ID", "credentials.client_id"),
    ("COGNITO_CLIENT_SECRET", "credentials.client_secret"),
    ("OAUTH_TOKEN_ENDPOINT", "credentials.token_endpoint"),
    ("OAUTH_SCOPE", "credentials.scope"),
    ("GATEWAY_URL", "gateway.url"),
];

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    /// Variables are set into the process environment for `${VAR}` resolution.
    pub env_files: Vec<String>,
    /// Which gateway endpoint to talk to
    pub mode: Mode,
    /// Cloud region, used to derive identity-provider URLs
    pub region: String,
    /// Agent identity (informational)
    pub agent: AgentConfig,
    /// OAuth2 client identity
    pub credentials: CredentialsConfig,
    /// Gateway connection
    pub gateway: GatewayConfig,
    /// Token lifecycle tuning
    pub token: TokenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_files: Vec::new(),
            mode: Mode::default(),
            region: DEFAULT_REGION.to_string(),
            agent: AgentConfig::default(),
            credentials: CredentialsConfig::default(),
            gateway: GatewayConfig::default(),
            token: TokenConfig::default(),
        }
    }
}

/// Local-vs-remote switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Talk to a gateway running on this machine
    Local,
    /// Talk to the deployed gateway
    #[default]
    Remote,
}

/// Agent identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name
    pub name: String,
    /// Model identifier the agent runs with
    pub model_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "gateway-agent".to_string(),
            model_id: "anthropic.claude-v2".to_string(),
        }
    }
}

/// How the client authenticates to the token endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuthMethod {
    /// `Authorization: Basic base64(client_id:client_secret)`
    #[default]
    Basic,
    /// `client_id` and `client_secret` in the form body
    Post,
}

/// OAuth2 client-credentials identity
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// OAuth2 client id
    pub client_id: String,
    /// OAuth2 client secret (supports `${VAR}`)
    pub client_secret: String,
    /// Identity pool id, used for OIDC discovery
    pub user_pool_id: String,
    /// Hosted auth domain prefix, used to derive the token endpoint
    pub domain_prefix: String,
    /// Explicit token endpoint (wins over derivation)
    pub token_endpoint: String,
    /// Space-separated scopes to request
    pub scope: String,
    /// Client authentication method
    pub client_auth: ClientAuthMethod,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_pool_id", &self.user_pool_id)
            .field("domain_prefix", &self.domain_prefix)
            .field("token_endpoint", &self.token_endpoint)
            .field("scope", &self.scope)
            .field("client_auth", &self.client_auth)
            .finish()
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployed gateway MCP endpoint
    pub url: String,
    /// Gateway endpoint used in local mode
    pub local_url: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// MCP protocol version to negotiate
    pub protocol_version: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            local_url: "http://localhost:8080/mcp".to_string(),
            timeout: Duration::from_secs(30),
            protocol_version: crate::protocol::PROTOCOL_VERSION.to_string(),
        }
    }
}

/// Token lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Refresh when the cached token expires within this margin
    #[serde(with = "humantime_serde")]
    pub refresh_margin: Duration,
    /// Timeout for a single token exchange
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_margin: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Where the token endpoint comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEndpointSource {
    /// Configured or derived URL
    Direct(String),
    /// Look the endpoint up from this OIDC discovery document
    Discovery(String),
}

impl Config {
    /// Load configuration from an optional YAML file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or the merged values do not
    /// deserialize.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path
            && !p.exists()
        {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                p.display()
            )));
        }

        let mut config = Self::extract(path)?;

        // Env files can define legacy and prefixed variables, so the layers
        // are extracted again once they are in the process environment
        if !config.env_files.is_empty() {
            config.load_env_files();
            config = Self::extract(path)?;
        }

        config.expand_env_vars()?;

        if config.region.is_empty() {
            config.region = DEFAULT_REGION.to_string();
        }

        Ok(config)
    }

    fn extract(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        if let Some(p) = path {
            figment = figment.merge(Yaml::file(p));
        }

        figment
            .merge(legacy_env())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in credential and gateway values
    fn expand_env_vars(&mut self) -> Result<()> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| Error::Internal(e.to_string()))?;

        let creds = &mut self.credentials;
        for value in [
            &mut creds.client_id,
            &mut creds.client_secret,
            &mut creds.user_pool_id,
            &mut creds.domain_prefix,
            &mut creds.token_endpoint,
            &mut creds.scope,
            &mut self.gateway.url,
            &mut self.gateway.local_url,
        ] {
            *value = Self::expand_string(&re, value);
        }
        Ok(())
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }

    /// Gateway endpoint selected by `mode`
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the field when the selected URL
    /// is empty or not an absolute http(s) URL.
    pub fn gateway_endpoint(&self) -> Result<&str> {
        let (field, value) = match self.mode {
            Mode::Local => ("gateway.local_url", &self.gateway.local_url),
            Mode::Remote => ("gateway.url", &self.gateway.url),
        };
        require(field, value)?;
        check_http_url(field, value)?;
        Ok(value)
    }

    /// OIDC discovery document URL for the configured user pool
    #[must_use]
    pub fn discovery_url(&self) -> Option<String> {
        let pool = self.credentials.user_pool_id.trim();
        if pool.is_empty() {
            return None;
        }
        Some(format!(
            "https://cognito-idp.{}.amazonaws.com/{pool}/.well-known/openid-configuration",
            self.region
        ))
    }

    /// Resolve where the token endpoint comes from, without network access
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming `credentials.token_endpoint` when
    /// neither an endpoint, a domain prefix, nor a user pool is configured.
    pub fn token_endpoint_source(&self) -> Result<TokenEndpointSource> {
        let creds = &self.credentials;
        if !creds.token_endpoint.trim().is_empty() {
            check_http_url("credentials.token_endpoint", &creds.token_endpoint)?;
            return Ok(TokenEndpointSource::Direct(creds.token_endpoint.clone()));
        }
        if !creds.domain_prefix.trim().is_empty() {
            return Ok(TokenEndpointSource::Direct(format!(
                "https://{}.auth.{}.amazoncognito.com/oauth2/token",
                creds.domain_prefix.trim(),
                self.region
            )));
        }
        self.discovery_url()
            .map(TokenEndpointSource::Discovery)
            .ok_or_else(|| Error::missing_field("credentials.token_endpoint"))
    }

    /// Check that everything needed to build the bridge is present
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing or malformed field.
    pub fn validate(&self) -> Result<()> {
        require("credentials.client_id", &self.credentials.client_id)?;
        require("credentials.client_secret", &self.credentials.client_secret)?;
        require("credentials.scope", &self.credentials.scope)?;
        self.token_endpoint_source()?;
        self.gateway_endpoint()?;
        Ok(())
    }
}

fn legacy_env() -> Env {
    let names: Vec<&str> = LEGACY_ENV.iter().map(|(name, _)| *name).collect();
    Env::raw().only(&names).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
            .map_or_else(|| key.into(), |(_, path)| (*path).into())
    })
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::missing_field(field));
    }
    Ok(())
}

fn check_http_url(field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::Config(format!("`{field}` is not a valid URL ({value}): {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "`{field}` must be an http(s) URL, got {value}"
        )));
    }
    Ok(())
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        // "ms" must be checked before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(serde::de::Error::custom)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map_err(serde::de::Error::custom)?
                .checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(|| serde::de::Error::custom(format!("duration out of range: {s}")))
        } else {
            // Assume seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(serde::de::Error::custom)
        }
    }
}
