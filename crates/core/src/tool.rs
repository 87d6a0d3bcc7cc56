//! Tool calls and results, the seam between the agent loop and its tools.
//!
//! The model asks for a tool by name with a JSON argument string. The agent
//! loop parses that into a [`ToolCall`] and hands it to a [`ToolDispatch`]
//! implementation, which always answers with a [`ToolResult`]. Failures are
//! data here, never errors: the loop has nothing to catch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Parsed arguments; always a JSON object
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Parse the model's raw argument string.
    ///
    /// Malformed JSON, or JSON that is not an object, becomes an empty
    /// object so the tool reports a validation error instead of the loop
    /// failing.
    pub fn from_message_call(call: &MessageToolCall) -> Self {
        let arguments = match serde_json::from_str::<serde_json::Value>(&call.arguments) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            _ => serde_json::Value::Object(serde_json::Map::new()),
        };
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        }
    }
}

/// The error half of a tool result, as the model sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub error: String,
}

impl From<ToolError> for ToolFailure {
    fn from(err: ToolError) -> Self {
        Self {
            url: err.url().map(str::to_string),
            error: err.to_string(),
        }
    }
}

/// The outcome of one tool call: a JSON payload or an `error` mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResult {
    Success(serde_json::Value),
    Failure(ToolFailure),
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Look up a top-level field of the result mapping.
    pub fn field(&self, key: &str) -> Option<serde_json::Value> {
        match self {
            Self::Success(value) => value.get(key).cloned(),
            Self::Failure(failure) => match key {
                "error" => Some(serde_json::Value::String(failure.error.clone())),
                "url" => failure.url.clone().map(serde_json::Value::String),
                _ => None,
            },
        }
    }

    /// Serialize for a tool-role message.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"error\":\"failed to serialize tool result: {e}\"}}")
        })
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        Self::Failure(err.into())
    }
}

/// Routes tool calls to their implementations.
///
/// Implementations must convert every failure into a [`ToolResult`].
#[async_trait]
pub trait ToolDispatch: Send + Sync {
    /// The tool schemas offered to the model.
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Execute one call.
    async fn dispatch(&self, call: &ToolCall) -> ToolResult;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: "call_1".into(),
            name: "web_search".into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn parses_object_arguments() {
        let call = ToolCall::from_message_call(&raw(r#"{"query":"rust"}"#));
        assert_eq!(call.arguments["query"], "rust");
        assert_eq!(call.id, "call_1");
    }

    #[test]
    fn malformed_arguments_degrade_to_empty_object() {
        for bad in ["{not json", "", "[1,2]", "\"text\""] {
            let call = ToolCall::from_message_call(&raw(bad));
            assert_eq!(call.arguments, json!({}), "input: {bad:?}");
        }
    }

    #[test]
    fn failure_serializes_as_error_mapping() {
        let result: ToolResult = ToolError::Network {
            url: "https://example.com".into(),
            reason: "timed out".into(),
        }
        .into();
        assert!(result.is_error());
        let value: serde_json::Value = serde_json::from_str(&result.to_content()).unwrap();
        assert_eq!(value["url"], "https://example.com");
        assert_eq!(value["error"], "HTTP request failed: timed out");
    }

    #[test]
    fn failure_without_url_omits_it() {
        let result = ToolResult::from(ToolError::UnknownTool("nope".into()));
        assert_eq!(result.to_content(), r#"{"error":"Unknown tool: nope"}"#);
    }

    #[test]
    fn success_passes_payload_through() {
        let result = ToolResult::Success(json!({"query": "q", "result_count": 0}));
        assert!(!result.is_error());
        assert_eq!(result.field("result_count"), Some(json!(0)));
        assert_eq!(result.field("error"), None);
    }
}
