//! Shared test doubles for the agent crate.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use summonbot_core::{
    Message, MessageToolCall, Provider, ProviderError, ProviderRequest, ProviderResponse,
    ToolCall, ToolDefinition, ToolDispatch, ToolResult, Usage,
};

/// A mock provider that returns a sequence of scripted responses and
/// remembers every request it saw.
///
/// Running out of responses is reported as a provider error.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();
        requests.push(request);

        responses.get(index).cloned().ok_or_else(|| {
            ProviderError::InvalidResponse(format!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                responses.len()
            ))
        })
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        finish_reason: Some("stop".into()),
        reasoning: None,
    }
}

/// Create a response with tool calls and optional visible content.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, content: &str) -> ProviderResponse {
    let mut msg = Message::assistant(content);
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: None,
        model: "mock-model".into(),
        finish_reason: Some("tool_calls".into()),
        reasoning: Some("need to look this up".into()),
    }
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}

/// Tool dispatcher that records calls and answers every one with a single
/// search hit.
#[derive(Default)]
pub struct RecordingTools {
    calls: Mutex<Vec<ToolCall>>,
}

impl RecordingTools {
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolDispatch for RecordingTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![ToolDefinition {
            name: "web_search".into(),
            description: "Search the web.".into(),
            parameters: json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        }]
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        self.calls.lock().unwrap().push(call.clone());
        ToolResult::Success(json!({
            "query": call.arguments.get("query").cloned().unwrap_or_default(),
            "result_count": 1,
            "results": [{"title": "Weather", "url": "https://weather.example", "snippet": "sunny", "engines": ["mock"]}]
        }))
    }
}
