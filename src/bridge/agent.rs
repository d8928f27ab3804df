//! Bridge lifecycle

use std::sync::Arc;

use tracing::{info, warn};

use super::toolset::{Toolset, build_toolset};
use crate::config::{AgentConfig, Config};
use crate::gateway::GatewaySession;
use crate::oauth::{CredentialStore, TokenProvider};
use crate::transport::{HttpTransport, Transport};
use crate::Result;

/// A connected gateway session and the toolset built from it
pub struct AgentBridge {
    agent: AgentConfig,
    session: Arc<GatewaySession>,
    toolset: Toolset,
}

impl AgentBridge {
    /// Load credentials, authenticate, connect and build the toolset
    ///
    /// # Errors
    ///
    /// Returns the first failure. Configuration problems are reported before
    /// any network call.
    pub async fn start(config: &Config) -> Result<Self> {
        let credential = CredentialStore::load(config).await?;
        let tokens = Arc::new(TokenProvider::from_config(credential, &config.token)?);
        let transport = HttpTransport::new(
            config.gateway_endpoint()?,
            config.gateway.timeout,
            &config.gateway.protocol_version,
        )?;
        Self::start_with(config.agent.clone(), tokens, transport).await
    }

    /// Start over an existing token provider and transport
    ///
    /// # Errors
    ///
    /// Returns the first failure; a session opened along the way is closed
    /// again before returning.
    pub async fn start_with(
        agent: AgentConfig,
        tokens: Arc<TokenProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        tokens.get_token().await?;

        let session = Arc::new(GatewaySession::connect(transport, tokens).await?);
        let toolset = match build_toolset(&session).await {
            Ok(toolset) => toolset,
            Err(e) => {
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "Failed to close session after startup error");
                }
                return Err(e);
            }
        };

        info!(
            agent = %agent.name,
            model = %agent.model_id,
            gateway = %session.endpoint(),
            tools = toolset.len(),
            "Agent bridge ready"
        );

        Ok(Self {
            agent,
            session,
            toolset,
        })
    }

    /// Agent identity
    #[must_use]
    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    /// Gateway session
    #[must_use]
    pub fn session(&self) -> &Arc<GatewaySession> {
        &self.session
    }

    /// Capabilities available to the agent
    #[must_use]
    pub fn toolset(&self) -> &Toolset {
        &self.toolset
    }

    /// Mutable toolset, for registering local tools
    pub fn toolset_mut(&mut self) -> &mut Toolset {
        &mut self.toolset
    }

    /// Close the gateway session
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to close.
    pub async fn shutdown(&self) -> Result<()> {
        info!(agent = %self.agent.name, "Shutting down agent bridge");
        self.session.close().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::Error;
    use crate::test_support::{
        FakeExchange, FakeTransport, credential, initialized, reply, token_provider,
    };

    fn gateway() -> Arc<FakeTransport> {
        FakeTransport::new(|method, _, _| match method {
            "initialize" => initialized(),
            _ => reply(json!({"tools": [{"name": "wills___save_answers"}]})),
        })
    }

    #[tokio::test]
    async fn start_wires_everything() {
        let transport = gateway();
        let bridge = AgentBridge::start_with(AgentConfig::default(), token_provider(), transport.clone())
            .await
            .unwrap();

        assert_eq!(bridge.toolset().len(), 1);
        assert_eq!(transport.calls_to("initialize"), 1);
        assert_eq!(transport.calls_to("tools/list"), 1);

        bridge.shutdown().await.unwrap();
        assert!(transport.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn token_failure_aborts_before_connect() {
        let tokens = Arc::new(TokenProvider::new(
            credential(),
            FakeExchange::new(vec![Err(Error::auth(
                crate::test_support::TOKEN_ENDPOINT,
                "invalid_client",
            ))]),
        ));
        let transport = gateway();
        let err = AgentBridge::start_with(AgentConfig::default(), tokens, transport.clone())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::Auth { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn catalog_failure_closes_session() {
        let transport = FakeTransport::new(|method, _, _| match method {
            "initialize" => initialized(),
            _ => reply(json!({"unexpected": true})),
        });
        let err = AgentBridge::start_with(AgentConfig::default(), token_provider(), transport.clone())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::Protocol(_)));
        assert!(transport.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn start_rejects_incomplete_config_without_network() {
        let config = Config::default();
        let err = AgentBridge::start(&config).await.err().unwrap();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("client_id")));
    }
}
