//! Error types for the M2M gateway bridge

use std::io;

use serde_json::Value;
use thiserror::Error;

use crate::protocol::JsonRpcError;

/// Result type alias for the gateway bridge
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway bridge errors
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration (fatal, raised before any network call)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token exchange rejected, or gateway still unauthorized after a refresh
    #[error("Authorization failed at {endpoint}{}: {reason}", status_suffix(.status))]
    Auth {
        /// Token endpoint or gateway URL
        endpoint: String,
        /// HTTP status, when one was received
        status: Option<u16>,
        /// Underlying cause
        reason: String,
    },

    /// Gateway answered 401 to a bearer token; eligible for refresh-and-retry
    #[error("Unauthorized by {endpoint}")]
    Unauthorized {
        /// Gateway URL
        endpoint: String,
    },

    /// Network or connectivity failure reaching the gateway
    #[error("Gateway unreachable at {endpoint}: {reason}")]
    GatewayUnreachable {
        /// Gateway URL
        endpoint: String,
        /// Underlying cause
        reason: String,
    },

    /// Request timed out
    #[error("Request to {endpoint} timed out")]
    Timeout {
        /// Target URL
        endpoint: String,
    },

    /// Remote tool reported an application-level failure
    #[error("Tool '{tool}' failed: {payload}")]
    ToolInvocation {
        /// Remote tool name
        tool: String,
        /// Remote error payload, verbatim
        payload: Value,
    },

    /// No capability with this name
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Non-success HTTP status other than an authorization failure
    #[error("HTTP {status} from {endpoint}: {body}")]
    Remote {
        /// Target URL
        endpoint: String,
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
        /// Optional data
        data: Option<Value>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRpcError> for Error {
    fn from(e: JsonRpcError) -> Self {
        Self::JsonRpc {
            code: e.code,
            message: e.message,
            data: e.data,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl Error {
    /// Configuration error naming a missing or empty field
    pub fn missing_field(field: &str) -> Self {
        Self::Config(format!("missing required field `{field}`"))
    }

    /// Authorization error without an HTTP status
    pub fn auth(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Auth {
            endpoint: endpoint.into(),
            status: None,
            reason: reason.into(),
        }
    }

    /// Whether this is a token-related failure the agent framework should
    /// report back through `invalidate()`
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::Unauthorized { .. })
    }

    /// Convert an error that exhausted its retry into the form surfaced to
    /// callers: a lingering 401 becomes an `Auth` error.
    #[must_use]
    pub fn into_terminal(self) -> Self {
        match self {
            Self::Unauthorized { endpoint } => Self::Auth {
                endpoint,
                status: Some(401),
                reason: "bearer token rejected after refresh".to_string(),
            },
            other => other,
        }
    }
}
