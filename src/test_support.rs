//! In-memory fakes shared by unit tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::oauth::{ClientCredential, TokenExchange, TokenProvider, TokenResponse};
use crate::protocol::{InitializeResult, JsonRpcResponse, RequestId};
use crate::transport::Transport;
use crate::{Error, Result};

pub const TOKEN_ENDPOINT: &str = "https://auth.example/oauth2/token";
pub const GATEWAY_ENDPOINT: &str = "https://gw.example/mcp";

/// Scripted token exchange; once the script runs out it keeps issuing
/// `tok1`, `tok2`, ... valid for an hour
pub struct FakeExchange {
    script: Mutex<VecDeque<Result<TokenResponse>>>,
    pub issued: AtomicU64,
    delay: Duration,
}

impl FakeExchange {
    pub fn new(script: Vec<Result<TokenResponse>>) -> Arc<Self> {
        Self::with_delay(script, Duration::ZERO)
    }

    pub fn with_delay(script: Vec<Result<TokenResponse>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            issued: AtomicU64::new(0),
            delay,
        })
    }
}

#[async_trait]
impl TokenExchange for FakeExchange {
    async fn exchange(&self, _credential: &ClientCredential) -> Result<TokenResponse> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(token_response(&format!("tok{n}"), 3600)))
    }
}

pub fn token_response(token: &str, expires_in: u64) -> TokenResponse {
    TokenResponse {
        access_token: token.to_string(),
        token_type: Some("Bearer".to_string()),
        expires_in: Some(expires_in),
        scope: None,
    }
}

pub fn credential() -> ClientCredential {
    ClientCredential::new("abc", "xyz", TOKEN_ENDPOINT, "gateway/invoke")
}

/// Provider issuing `tok1`, `tok2`, ... on demand
pub fn token_provider() -> Arc<TokenProvider> {
    Arc::new(TokenProvider::new(credential(), FakeExchange::new(vec![])))
}

type Handler = dyn Fn(&str, Option<&Value>, &str) -> Result<JsonRpcResponse> + Send + Sync;

/// Transport answering every call through one handler
///
/// The handler sees the method (`initialize` for the handshake), the params
/// and the bearer token.
pub struct FakeTransport {
    handler: Box<Handler>,
    pub calls: AtomicUsize,
    pub closed: AtomicBool,
    connected: AtomicBool,
    /// `(method, bearer)` per call, in arrival order
    pub log: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    pub fn new(
        handler: impl Fn(&str, Option<&Value>, &str) -> Result<JsonRpcResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Number of calls made for `method`
    pub fn calls_to(&self, method: &str) -> usize {
        self.log.lock().iter().filter(|(m, _)| m == method).count()
    }

    /// Bearer tokens presented for `method`, in order
    pub fn bearers_for(&self, method: &str) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }

    fn dispatch(&self, method: &str, params: Option<&Value>, bearer: &str) -> Result<JsonRpcResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push((method.to_string(), bearer.to_string()));
        (self.handler)(method, params, bearer)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn initialize(&self, bearer: &str) -> Result<InitializeResult> {
        tokio::task::yield_now().await;
        let result = self.dispatch("initialize", None, bearer)?.into_result()?;
        let result = serde_json::from_value(result)?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(result)
    }

    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        bearer: &str,
    ) -> Result<JsonRpcResponse> {
        tokio::task::yield_now().await;
        self.dispatch(method, params.as_ref(), bearer)
    }

    async fn notify(&self, _method: &str, _params: Option<Value>, _bearer: &str) -> Result<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self, _bearer: &str) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        GATEWAY_ENDPOINT
    }
}

/// Successful reply to any request
pub fn reply(result: Value) -> Result<JsonRpcResponse> {
    Ok(JsonRpcResponse::success(RequestId::Number(1), result))
}

/// Handshake reply
pub fn initialized() -> Result<JsonRpcResponse> {
    reply(json!({
        "protocolVersion": "2025-03-26",
        "capabilities": {"tools": {}},
        "serverInfo": {"name": "fake-gateway", "version": "1.0"}
    }))
}

/// A `tools/call` result with one text block
pub fn text_result(text: &str) -> Result<JsonRpcResponse> {
    reply(json!({"content": [{"type": "text", "text": text}], "isError": false}))
}

pub fn unauthorized() -> Error {
    Error::Unauthorized {
        endpoint: GATEWAY_ENDPOINT.to_string(),
    }
}

pub fn timeout() -> Error {
    Error::Timeout {
        endpoint: GATEWAY_ENDPOINT.to_string(),
    }
}
