//! Gateway session
//!
//! A session never owns a token. Each request asks the token provider for
//! the current one, so a refresh made by any caller is picked up by all.

use std::future::Future;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::descriptor::RemoteToolDescriptor;
use super::output::ToolOutput;
use crate::config::Config;
use crate::failsafe::{self, Operation, RetryDecision};
use crate::oauth::TokenProvider;
use crate::protocol::{
    Content, Info, JsonRpcResponse, Tool, ToolsCallParams, ToolsCallResult, ToolsListParams,
    ToolsListResult,
};
use crate::transport::{HttpTransport, Transport};
use crate::{Error, Result};

/// Built-in semantic tool search exposed by the gateway
pub const SEARCH_TOOL: &str = "x_amz_bedrock_agentcore_search";

/// Upper bound on `tools/list` pages followed per catalog fetch
const MAX_CATALOG_PAGES: usize = 64;

/// An open, authorized connection to the tool gateway
pub struct GatewaySession {
    transport: Arc<dyn Transport>,
    tokens: Arc<TokenProvider>,
    server_info: Info,
    catalog: OnceCell<Arc<[RemoteToolDescriptor]>>,
}

impl GatewaySession {
    /// Open an HTTP session to the gateway selected by `config`
    ///
    /// # Errors
    ///
    /// See [`GatewaySession::connect`].
    pub async fn open(config: &Config, tokens: Arc<TokenProvider>) -> Result<Self> {
        let transport = HttpTransport::new(
            config.gateway_endpoint()?,
            config.gateway.timeout,
            &config.gateway.protocol_version,
        )?;
        Self::connect(transport, tokens).await
    }

    /// Handshake with the gateway over `transport`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the gateway rejects a freshly issued token,
    /// and [`Error::GatewayUnreachable`] if the gateway cannot be reached
    /// after one retry.
    pub async fn connect(transport: Arc<dyn Transport>, tokens: Arc<TokenProvider>) -> Result<Self> {
        let endpoint = transport.endpoint().to_string();
        info!(endpoint = %endpoint, "Connecting to gateway");

        let handshake = Arc::clone(&transport);
        let server_info = with_token_retry(&tokens, &endpoint, Operation::Connect, move |bearer| {
            let transport = Arc::clone(&handshake);
            async move { transport.initialize(&bearer).await }
        })
        .await
        .map_err(|e| match e {
            Error::Timeout { endpoint } => Error::GatewayUnreachable {
                endpoint,
                reason: "connection timed out".to_string(),
            },
            other => other,
        })?
        .server_info;

        info!(endpoint = %endpoint, server = %server_info.name, "Gateway session established");

        Ok(Self {
            transport,
            tokens,
            server_info,
            catalog: OnceCell::new(),
        })
    }

    /// Gateway URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Server identity reported during the handshake
    #[must_use]
    pub fn server_info(&self) -> &Info {
        &self.server_info
    }

    /// Token provider backing this session
    #[must_use]
    pub fn token_provider(&self) -> &Arc<TokenProvider> {
        &self.tokens
    }

    /// Whether the transport is still connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Remote tool catalog, fetched once per session
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched. A failed fetch is
    /// not cached; the next call tries again.
    pub async fn list_tools(&self) -> Result<Arc<[RemoteToolDescriptor]>> {
        self.catalog
            .get_or_try_init(|| self.fetch_catalog())
            .await
            .map(Arc::clone)
    }

    async fn fetch_catalog(&self) -> Result<Arc<[RemoteToolDescriptor]>> {
        let mut descriptors = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=MAX_CATALOG_PAGES {
            let params = serde_json::to_value(ToolsListParams {
                cursor: cursor.take(),
            })?;
            let result = self.call("tools/list", params).await?.into_result()?;
            let result: ToolsListResult = serde_json::from_value(result)
                .map_err(|e| Error::Protocol(format!("Invalid tools/list result: {e}")))?;

            debug!(page, tools = result.tools.len(), "Fetched catalog page");
            descriptors.extend(result.tools.into_iter().map(RemoteToolDescriptor::from));

            match result.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) if page == MAX_CATALOG_PAGES => {
                    warn!(cursor = %next, "Catalog page limit reached, ignoring remaining pages");
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(endpoint = %self.endpoint(), tools = descriptors.len(), "Discovered remote tools");
        Ok(descriptors.into())
    }

    /// Invoke a remote tool
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolInvocation`] carrying the remote payload for
    /// JSON-RPC errors, `isError` results and HTTP failures other than
    /// authorization; [`Error::Auth`] if the token is rejected after a
    /// refresh.
    pub async fn invoke(&self, tool: &str, arguments: Value) -> Result<ToolOutput> {
        let params = serde_json::to_value(ToolsCallParams {
            name: tool.to_string(),
            arguments,
        })?;

        debug!(tool = %tool, "Invoking remote tool");
        let response = match self.call("tools/call", params).await {
            Ok(response) => response,
            Err(Error::Remote { status, body, .. }) => {
                let body = serde_json::from_str(&body).unwrap_or(Value::String(body));
                return Err(invocation_error(tool, json!({"status": status, "body": body})));
            }
            Err(e) => return Err(e),
        };

        let result = match response.into_result() {
            Ok(result) => result,
            Err(e) => return Err(invocation_error(tool, serde_json::to_value(e)?)),
        };

        let parsed: ToolsCallResult = serde_json::from_value(result.clone())
            .map_err(|e| Error::Protocol(format!("Invalid tools/call result for '{tool}': {e}")))?;
        if parsed.is_error {
            return Err(invocation_error(tool, result));
        }
        Ok(parsed.into())
    }

    /// Semantic search over the gateway's tools
    ///
    /// # Errors
    ///
    /// Same as [`GatewaySession::invoke`], plus a protocol error when the
    /// search result is not a JSON list of tools.
    pub async fn search_tools(&self, query: &str) -> Result<Vec<RemoteToolDescriptor>> {
        let output = self.invoke(SEARCH_TOOL, json!({"query": query})).await?;

        let text = output.content.iter().find_map(|c| match c {
            Content::Text { text, .. } => Some(text.as_str()),
            _ => None,
        });
        let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(Vec::new());
        };

        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::Protocol(format!("Invalid search result: {e}")))?;
        let tools = match value {
            Value::Object(mut map) if map.contains_key("tools") => {
                map.remove("tools").unwrap_or_default()
            }
            other => other,
        };
        let tools: Vec<Tool> = serde_json::from_value(tools)
            .map_err(|e| Error::Protocol(format!("Invalid search result: {e}")))?;

        debug!(query = %query, matches = tools.len(), "Tool search complete");
        Ok(tools.into_iter().map(RemoteToolDescriptor::from).collect())
    }

    /// Terminate the remote session
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to close.
    pub async fn close(&self) -> Result<()> {
        let bearer = self
            .tokens
            .cached()
            .map(|t| t.access_token().to_string())
            .unwrap_or_default();
        self.transport.close(&bearer).await?;
        info!(endpoint = %self.endpoint(), "Gateway session closed");
        Ok(())
    }

    async fn call(&self, method: &'static str, params: Value) -> Result<JsonRpcResponse> {
        let transport = Arc::clone(&self.transport);
        with_token_retry(&self.tokens, self.endpoint(), Operation::ToolCall, move |bearer| {
            let transport = Arc::clone(&transport);
            let params = params.clone();
            async move { transport.request(method, Some(params), &bearer).await }
        })
        .await
    }
}

fn invocation_error(tool: &str, payload: Value) -> Error {
    warn!(tool = %tool, "Remote tool reported a failure");
    Error::ToolInvocation {
        tool: tool.to_string(),
        payload,
    }
}

/// Run `call` with the current bearer token, refreshing or retrying once as
/// the retry policy dictates
async fn with_token_retry<T, F, Fut>(
    tokens: &TokenProvider,
    endpoint: &str,
    operation: Operation,
    mut call: F,
) -> Result<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        let token = tokens.get_token().await?;
        let error = match call(token.access_token().to_string()).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        match failsafe::decide(operation, &error, attempt) {
            RetryDecision::RefreshAndRetry => {
                warn!(endpoint = %endpoint, attempt, "Bearer token rejected, refreshing");
                tokens.invalidate_token(&token);
            }
            RetryDecision::Retry => {
                warn!(endpoint = %endpoint, attempt, error = %error, "Request failed, retrying");
            }
            RetryDecision::Fail => return Err(error.into_terminal()),
        }
        attempt += 1;
    }
}
