//! Capabilities exposed to the agent

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;
use crate::gateway::{GatewaySession, RemoteToolDescriptor, ToolOutput};

/// What the agent sees for every capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    /// Unique tool name
    pub name: String,
    /// Description for the model
    pub description: String,
    /// JSON Schema of the arguments
    pub input_schema: Value,
}

impl ToolSpec {
    /// Create a spec
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

impl From<&RemoteToolDescriptor> for ToolSpec {
    fn from(descriptor: &RemoteToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            input_schema: descriptor.input_schema.clone(),
        }
    }
}

/// In-process tool implementation
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool
    async fn call(&self, arguments: Value) -> Result<ToolOutput>;
}

#[async_trait]
impl<F> ToolHandler for F
where
    F: Fn(Value) -> Result<ToolOutput> + Send + Sync,
{
    async fn call(&self, arguments: Value) -> Result<ToolOutput> {
        self(arguments)
    }
}

/// A tool running in this process
#[derive(Clone)]
pub struct LocalTool {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

impl LocalTool {
    /// Wrap a handler
    pub fn new(spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Self {
        Self { spec, handler }
    }
}

/// A tool served by the gateway
#[derive(Clone)]
pub struct RemoteTool {
    descriptor: RemoteToolDescriptor,
    session: Arc<GatewaySession>,
}

impl RemoteTool {
    /// Bind a descriptor to the session that advertised it
    pub fn new(descriptor: RemoteToolDescriptor, session: Arc<GatewaySession>) -> Self {
        Self {
            descriptor,
            session,
        }
    }

    /// Descriptor as discovered
    #[must_use]
    pub fn descriptor(&self) -> &RemoteToolDescriptor {
        &self.descriptor
    }
}

/// A tool the agent can call
#[derive(Clone)]
pub enum Capability {
    /// In-process tool
    Local(LocalTool),
    /// Gateway tool
    Remote(RemoteTool),
}

impl Capability {
    /// Tool name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Local(tool) => &tool.spec.name,
            Self::Remote(tool) => &tool.descriptor.name,
        }
    }

    /// Agent-facing spec
    #[must_use]
    pub fn spec(&self) -> ToolSpec {
        match self {
            Self::Local(tool) => tool.spec.clone(),
            Self::Remote(tool) => ToolSpec::from(&tool.descriptor),
        }
    }

    /// Whether the tool is served by the gateway
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Call the tool
    ///
    /// # Errors
    ///
    /// Propagates the handler's or the gateway's error unchanged.
    pub async fn invoke(&self, arguments: Value) -> Result<ToolOutput> {
        match self {
            Self::Local(tool) => tool.handler.call(arguments).await,
            Self::Remote(tool) => tool.session.invoke(&tool.descriptor.name, arguments).await,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_remote() { "Remote" } else { "Local" };
        f.debug_tuple(kind).field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(arguments: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::json(arguments))
    }

    #[tokio::test]
    async fn local_capability_invokes_handler() {
        let capability = Capability::Local(LocalTool::new(
            ToolSpec::new("echo", "Echo arguments", json!({"type": "object"})),
            Arc::new(echo),
        ));

        assert_eq!(capability.name(), "echo");
        assert!(!capability.is_remote());
        let output = capability.invoke(json!({"a": 1})).await.unwrap();
        assert_eq!(output.structured_content, Some(json!({"a": 1})));
    }

    #[test]
    fn spec_from_descriptor() {
        let descriptor = RemoteToolDescriptor {
            name: "claims___file_claim".to_string(),
            title: None,
            description: "File a claim".to_string(),
            input_schema: json!({"type": "object"}),
            target: Some("claims".to_string()),
        };
        let spec = ToolSpec::from(&descriptor);
        assert_eq!(spec.name, "claims___file_claim");
        assert_eq!(spec.description, "File a claim");
    }
}
