//! Uniform tool call results

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::protocol::{Content, ToolsCallResult};

/// Result of any capability call, local or remote
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    /// Content blocks
    #[serde(default)]
    pub content: Vec<Content>,
    /// Structured result, when the tool produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    /// Whether the tool reported a failure
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful output with one text block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            structured_content: None,
            is_error: false,
        }
    }

    /// Failed output with one text block
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// Successful output carrying a JSON value, rendered as text as well
    #[must_use]
    pub fn json(value: Value) -> Self {
        Self {
            content: vec![Content::text(value.to_string())],
            structured_content: Some(value),
            is_error: false,
        }
    }

    /// Error output for a remote failure payload
    ///
    /// Payloads shaped like a tool result keep their content blocks; any
    /// other payload is passed through as structured content.
    #[must_use]
    pub fn from_failure(payload: &Value) -> Self {
        if let Ok(result) = serde_json::from_value::<ToolsCallResult>(payload.clone()) {
            if !result.content.is_empty() {
                return Self {
                    is_error: true,
                    ..result.into()
                };
            }
        }
        Self {
            content: vec![Content::text(payload.to_string())],
            structured_content: Some(payload.clone()),
            is_error: true,
        }
    }

    /// Flatten all content blocks into one string
    #[must_use]
    pub fn to_text(&self) -> String {
        if self.content.is_empty() {
            return self
                .structured_content
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default();
        }
        self.content
            .iter()
            .map(Content::to_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Agent-facing JSON: structured content when present, text otherwise
    #[must_use]
    pub fn to_value(&self) -> Value {
        let content = self
            .structured_content
            .clone()
            .unwrap_or_else(|| Value::String(self.to_text()));
        json!({
            "content": content,
            "isError": self.is_error,
        })
    }
}

impl From<ToolsCallResult> for ToolOutput {
    fn from(result: ToolsCallResult) -> Self {
        Self {
            content: result.content,
            structured_content: result.structured_content,
            is_error: result.is_error,
        }
    }
}
