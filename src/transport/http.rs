//! Streamable HTTP transport
//!
//! Every JSON-RPC message is POSTed to the gateway endpoint. Servers may
//! answer with plain JSON or with a single SSE-framed message, and may
//! assign a session id that must accompany later requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::Transport;
use crate::protocol::{
    ClientCapabilities, Info, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, RequestId,
};
use crate::{Error, Result};

const SESSION_HEADER: &str = "MCP-Session-Id";
const PROTOCOL_HEADER: &str = "MCP-Protocol-Version";

/// HTTP transport for a streamable-HTTP gateway
pub struct HttpTransport {
    /// HTTP client
    client: Client,
    /// Gateway endpoint
    url: String,
    /// Protocol version sent on every request
    protocol_version: String,
    /// Session ID assigned by the server
    session_id: RwLock<Option<String>>,
    /// Request ID counter
    request_id: AtomicI64,
    /// Connected flag
    connected: AtomicBool,
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration, protocol_version: &str) -> Result<Arc<Self>> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Arc::new(Self {
            client,
            url: url.to_string(),
            protocol_version: protocol_version.to_string(),
            session_id: RwLock::new(None),
            request_id: AtomicI64::new(1),
            connected: AtomicBool::new(false),
        }))
    }

    /// Session id assigned by the gateway, if any
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// POST with the standard headers
    fn post(&self, bearer: &str) -> RequestBuilder {
        let mut request = self
            .client
            .post(&self.url)
            .bearer_auth(bearer)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json, text/event-stream")
            .header(PROTOCOL_HEADER, &self.protocol_version);

        if let Some(ref session_id) = *self.session_id.read() {
            request = request.header(SESSION_HEADER, session_id);
        }
        request
    }

    /// Send a raw request and decode the reply
    async fn send_request(&self, request: &JsonRpcRequest, bearer: &str) -> Result<JsonRpcResponse> {
        debug!(method = %request.method, id = %request.id, "Sending request");

        let response = self
            .post(bearer)
            .json(request)
            .send()
            .await
            .map_err(|e| self.send_error(&e))?;

        self.remember_session(&response);
        let response = self.check_status(response).await?;

        let is_sse = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/event-stream"));

        let body = response.text().await.map_err(|e| self.send_error(&e))?;

        if is_sse {
            decode_sse(&body)
        } else {
            serde_json::from_str(&body)
                .map_err(|e| Error::Protocol(format!("Failed to parse response: {e}")))
        }
    }

    /// Store the session id the first time the server assigns one
    fn remember_session(&self, response: &Response) {
        if self.session_id.read().is_some() {
            return;
        }
        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            info!(session_id = %id, url = %self.url, "Stored session ID from response");
            *self.session_id.write() = Some(id.to_string());
        }
    }

    /// Map a non-success status to the matching error
    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => Error::Unauthorized {
                endpoint: self.url.clone(),
            },
            StatusCode::FORBIDDEN => Error::Auth {
                endpoint: self.url.clone(),
                status: Some(status.as_u16()),
                reason: if body.is_empty() {
                    "forbidden".to_string()
                } else {
                    body
                },
            },
            _ => Error::Remote {
                endpoint: self.url.clone(),
                status: status.as_u16(),
                body,
            },
        })
    }

    fn send_error(&self, error: &reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout {
                endpoint: self.url.clone(),
            }
        } else {
            Error::GatewayUnreachable {
                endpoint: self.url.clone(),
                reason: error.to_string(),
            }
        }
    }

    /// Get next request ID
    fn next_id(&self) -> RequestId {
        RequestId::Number(self.request_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Extract the JSON-RPC response from an SSE body
///
/// Server-initiated notifications may precede the response on the same
/// stream; the first `data:` payload carrying an id wins.
fn decode_sse(body: &str) -> Result<JsonRpcResponse> {
    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(data.trim()) else {
            continue;
        };
        if value.get("id").is_some_and(|id| !id.is_null()) {
            return serde_json::from_value(value)
                .map_err(|e| Error::Protocol(format!("Failed to parse SSE data: {e}")));
        }
    }
    Err(Error::Protocol("No response in SSE stream".to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn initialize(&self, bearer: &str) -> Result<InitializeResult> {
        self.connected.store(false, Ordering::Relaxed);
        *self.session_id.write() = None;

        let params = InitializeParams {
            protocol_version: self.protocol_version.clone(),
            capabilities: ClientCapabilities::default(),
            client_info: Info {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
            },
        };
        let request = JsonRpcRequest::new(
            RequestId::Number(0),
            "initialize",
            Some(serde_json::to_value(&params)?),
        );

        let result = self
            .send_request(&request, bearer)
            .await?
            .into_result()?;
        let result: InitializeResult = serde_json::from_value(result)
            .map_err(|e| Error::Protocol(format!("Invalid initialize result: {e}")))?;

        self.notify("notifications/initialized", None, bearer).await?;

        self.connected.store(true, Ordering::Relaxed);
        info!(
            url = %self.url,
            server = %result.server_info.name,
            protocol_version = %result.protocol_version,
            "Gateway session initialized"
        );
        Ok(result)
    }

    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        bearer: &str,
    ) -> Result<JsonRpcResponse> {
        let request = JsonRpcRequest::new(self.next_id(), method, params);
        self.send_request(&request, bearer).await
    }

    async fn notify(&self, method: &str, params: Option<Value>, bearer: &str) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);

        let response = self
            .post(bearer)
            .json(&notification)
            .send()
            .await
            .map_err(|e| self.send_error(&e))?;

        self.remember_session(&response);
        match self.check_status(response).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_authorization() => Err(e),
            Err(e) => {
                warn!(method = %method, url = %self.url, error = %e, "Notification failed");
                Ok(())
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn close(&self, bearer: &str) -> Result<()> {
        self.connected.store(false, Ordering::Relaxed);

        let Some(id) = self.session_id.write().take() else {
            return Ok(());
        };

        match self
            .client
            .delete(&self.url)
            .bearer_auth(bearer)
            .header(SESSION_HEADER, &id)
            .send()
            .await
        {
            Ok(response) => {
                debug!(session_id = %id, status = %response.status(), "Session terminated");
            }
            Err(e) => debug!(session_id = %id, error = %e, "Session termination failed"),
        }
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
