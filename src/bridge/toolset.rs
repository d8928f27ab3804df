//! Name-ordered set of capabilities

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::capability::{Capability, LocalTool, RemoteTool, ToolHandler, ToolSpec};
use crate::gateway::{GatewaySession, ToolOutput};
use crate::oauth::TokenProvider;
use crate::{Error, Result};

/// Build the remote half of an agent's toolset from an open session
///
/// # Errors
///
/// Returns an error if the catalog cannot be fetched.
pub async fn build_toolset(session: &Arc<GatewaySession>) -> Result<Toolset> {
    Toolset::from_session(session).await
}

/// Every capability the agent may call, ordered by name
#[derive(Default, Clone)]
pub struct Toolset {
    capabilities: BTreeMap<String, Capability>,
    tokens: Option<Arc<TokenProvider>>,
}

impl Toolset {
    /// Empty toolset with no gateway behind it
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Map every tool in the session's catalog to a remote capability
    ///
    /// Names and schemas are copied verbatim, so building twice from the
    /// same catalog yields identical specs.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be fetched.
    pub async fn from_session(session: &Arc<GatewaySession>) -> Result<Self> {
        let catalog = session.list_tools().await?;
        let mut capabilities = BTreeMap::new();

        for descriptor in catalog.iter() {
            if capabilities.contains_key(&descriptor.name) {
                warn!(tool = %descriptor.name, "Duplicate remote tool name, keeping the first");
                continue;
            }
            capabilities.insert(
                descriptor.name.clone(),
                Capability::Remote(RemoteTool::new(descriptor.clone(), Arc::clone(session))),
            );
        }

        debug!(tools = capabilities.len(), "Built toolset from gateway catalog");
        Ok(Self {
            capabilities,
            tokens: Some(Arc::clone(session.token_provider())),
        })
    }

    /// Add an in-process tool
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty or already taken.
    pub fn register_local(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Result<()> {
        if spec.name.trim().is_empty() {
            return Err(Error::Config("local tool name must not be empty".to_string()));
        }
        if self.capabilities.contains_key(&spec.name) {
            return Err(Error::Config(format!(
                "tool name `{}` is already registered",
                spec.name
            )));
        }
        debug!(tool = %spec.name, "Registered local tool");
        self.capabilities
            .insert(spec.name.clone(), Capability::Local(LocalTool::new(spec, handler)));
        Ok(())
    }

    /// Call a capability by name
    ///
    /// A remote tool failure comes back as an error output so the agent can
    /// read it; authorization and transport faults stay typed errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] for unknown names, and any error
    /// other than a tool invocation failure.
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let capability = self
            .capabilities
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;

        match capability.invoke(arguments).await {
            Err(Error::ToolInvocation { tool, payload }) => {
                debug!(tool = %tool, "Returning tool failure to the agent");
                Ok(ToolOutput::from_failure(&payload))
            }
            other => other,
        }
    }

    /// Drop the cached token after the agent framework saw an
    /// authorization failure
    pub fn report_unauthorized(&self) {
        if let Some(tokens) = &self.tokens {
            tokens.invalidate();
        }
    }

    /// Specs of every capability, ordered by name
    #[must_use]
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.capabilities.values().map(Capability::spec).collect()
    }

    /// Capability by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    /// Capability names, ordered
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }

    /// Number of capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether the toolset is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
