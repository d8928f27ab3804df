//! Transport to the tool gateway
//!
//! The session layer decides when to refresh tokens and retry; a transport
//! only moves JSON-RPC messages and classifies failures. Every call carries
//! the bearer token to present, so a refreshed token takes effect on the
//! very next request.

mod http;

pub use self::http::HttpTransport;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::protocol::{InitializeResult, JsonRpcResponse};

/// Transport trait for gateway communication
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run the protocol handshake (`initialize`, then
    /// `notifications/initialized`)
    async fn initialize(&self, bearer: &str) -> Result<InitializeResult>;

    /// Send a request and wait for response
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        bearer: &str,
    ) -> Result<JsonRpcResponse>;

    /// Send a notification (no response expected)
    async fn notify(&self, method: &str, params: Option<Value>, bearer: &str) -> Result<()>;

    /// Check if transport is connected
    fn is_connected(&self) -> bool;

    /// Terminate the remote session
    async fn close(&self, bearer: &str) -> Result<()>;

    /// Gateway URL, for logs and errors
    fn endpoint(&self) -> &str;
}
