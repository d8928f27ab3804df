//! Remote tool descriptors

use serde::Serialize;
use serde_json::Value;

use crate::protocol::Tool;

/// Separator between target and tool in gateway tool names
pub const TARGET_SEPARATOR: &str = "___";

/// A tool advertised by the gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteToolDescriptor {
    /// Full tool name as advertised (`<target>___<tool>`)
    pub name: String,
    /// Human-readable title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Description shown to the agent
    pub description: String,
    /// JSON Schema of the arguments
    pub input_schema: Value,
    /// Gateway target the tool belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl RemoteToolDescriptor {
    /// Tool name without the target prefix
    #[must_use]
    pub fn tool_name(&self) -> &str {
        self.name
            .split_once(TARGET_SEPARATOR)
            .map_or(self.name.as_str(), |(_, tool)| tool)
    }
}

impl From<Tool> for RemoteToolDescriptor {
    fn from(tool: Tool) -> Self {
        let target = tool
            .name
            .split_once(TARGET_SEPARATOR)
            .map(|(target, _)| target)
            .filter(|target| !target.is_empty())
            .map(String::from);

        let description = tool
            .description
            .or_else(|| tool.title.clone())
            .unwrap_or_default();

        Self {
            name: tool.name,
            title: tool.title,
            description,
            input_schema: tool.input_schema,
            target,
        }
    }
}
