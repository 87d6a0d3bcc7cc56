//! The agent loop: a bounded tool-calling conversation with the model.
//!
//! ```text
//! AwaitingModel ──tool calls──▶ HandlingTools ──▶ AwaitingModel
//!       │                                             │
//!       └──text only──▶ Done     step budget spent ──▶ Fallback ──▶ Done
//! ```
//!
//! The model gets at most `max_tool_steps` tool-enabled completions. If it
//! is still calling tools after that, one more completion without tools is
//! requested, so the loop issues at most `max_tool_steps + 1` requests and
//! always ends with a non-empty answer.

use std::sync::Arc;
use std::time::Duration;

use summonbot_config::ProviderConfig;
use summonbot_core::{
    Message, MessageToolCall, Provider, ProviderRequest, ProviderResponse, Result, ToolCall,
    ToolChoice, ToolDispatch,
};
use summonbot_tools::summarize;
use tracing::{debug, info};

/// Reply used when the model answers with nothing.
pub const EMPTY_ANSWER_APOLOGY: &str = "I'm sorry, I couldn't generate a response right now.";

/// Reply used when even the fallback completion produced nothing.
pub const FALLBACK_APOLOGY: &str = "I'm sorry, I couldn't generate a reliable answer right now.";

pub const FALLBACK_INSTRUCTION: &str = "Tool attempts are complete. Provide a best-effort final \
answer now using available context and any successful tool outputs. If uncertainty remains, \
acknowledge it briefly.";

const LOG_PREVIEW_CHARS: usize = 1200;

/// Trim and shorten text for a log line.
pub fn truncate_for_log(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(LOG_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}... [truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

/// Knobs for one agent loop.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tool_steps: usize,
    pub timeout: Duration,
    pub reasoning_effort: Option<String>,
}

impl AgentSettings {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tool_steps: config.max_tool_steps.max(1),
            timeout: config.timeout(),
            reasoning_effort: config.reasoning_effort.clone(),
        }
    }
}

/// How the loop reached its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The model answered without calling a tool
    Answered,
    /// The model answered with empty text
    EmptyAnswer,
    /// The step budget ran out and the fallback completion was used
    Fallback,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: String,
    pub exit: LoopExit,
    /// Completion requests issued, fallback included
    pub completions: usize,
    pub tool_calls: usize,
}

enum LoopState {
    AwaitingModel { step: usize },
    HandlingTools { step: usize, calls: Vec<MessageToolCall> },
    FallbackCompletion,
    Done { answer: String, exit: LoopExit },
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<dyn ToolDispatch>,
    settings: AgentSettings,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<dyn ToolDispatch>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    fn request(&self, messages: &[Message], with_tools: bool) -> ProviderRequest {
        let mut request = ProviderRequest::new(&self.settings.model, messages.to_vec());
        request.timeout = Some(self.settings.timeout);
        request.reasoning_effort = self.settings.reasoning_effort.clone();
        if with_tools {
            request.tools = self.tools.definitions();
            request.tool_choice = Some(ToolChoice::Auto);
            request.parallel_tool_calls = Some(false);
        }
        request
    }

    fn log_step(step: usize, response: &ProviderResponse) {
        info!(
            step,
            finish_reason = response.finish_reason.as_deref().unwrap_or("none"),
            tool_calls = response.message.tool_calls.len(),
            "Model step"
        );
        match response.reasoning.as_deref().map(str::trim) {
            Some(reasoning) if !reasoning.is_empty() => {
                info!("Reasoning: {}", truncate_for_log(reasoning))
            }
            _ => info!("Reasoning: [not provided by model/provider]"),
        }
        let content = response.message.content.trim();
        if !content.is_empty() {
            info!("Assistant content: {}", truncate_for_log(content));
        }
    }

    /// Run the conversation that starts with `system` and `user`.
    ///
    /// Provider failures end the loop with an error; tool failures never do.
    pub async fn run(&self, system: Message, user: Message) -> Result<AgentOutcome> {
        let mut messages = vec![system, user];
        let mut last_text = String::new();
        let mut completions = 0;
        let mut tool_calls = 0;
        let mut state = LoopState::AwaitingModel { step: 0 };

        loop {
            state = match state {
                LoopState::AwaitingModel { step } if step >= self.settings.max_tool_steps => {
                    LoopState::FallbackCompletion
                }
                LoopState::AwaitingModel { step } => {
                    let response = self
                        .provider
                        .complete(self.request(&messages, true))
                        .await?;
                    completions += 1;
                    Self::log_step(step, &response);

                    let text = response.message.content.trim().to_string();
                    if !text.is_empty() {
                        last_text = text.clone();
                    }

                    if response.message.tool_calls.is_empty() {
                        if text.is_empty() {
                            LoopState::Done {
                                answer: EMPTY_ANSWER_APOLOGY.to_string(),
                                exit: LoopExit::EmptyAnswer,
                            }
                        } else {
                            LoopState::Done {
                                answer: text,
                                exit: LoopExit::Answered,
                            }
                        }
                    } else {
                        let calls = response.message.tool_calls.clone();
                        messages.push(response.message);
                        LoopState::HandlingTools { step, calls }
                    }
                }
                LoopState::HandlingTools { step, calls } => {
                    for raw in &calls {
                        let call = ToolCall::from_message_call(raw);
                        info!("Tool call: {}({})", call.name, call.arguments);
                        let result = self.tools.dispatch(&call).await;
                        tool_calls += 1;
                        info!("Tool result: {} -> {}", call.name, summarize(&call.name, &result));
                        messages.push(Message::tool_result(
                            &call.id,
                            &call.name,
                            result.to_content(),
                        ));
                    }
                    LoopState::AwaitingModel { step: step + 1 }
                }
                LoopState::FallbackCompletion => {
                    debug!(
                        steps = self.settings.max_tool_steps,
                        "Tool step budget exhausted, requesting best-effort answer"
                    );
                    messages.push(Message::system(FALLBACK_INSTRUCTION));
                    let response = self
                        .provider
                        .complete(self.request(&messages, false))
                        .await?;
                    completions += 1;
                    Self::log_step(self.settings.max_tool_steps, &response);

                    let text = response.message.content.trim();
                    let answer = if !text.is_empty() {
                        text.to_string()
                    } else if !last_text.is_empty() {
                        std::mem::take(&mut last_text)
                    } else {
                        FALLBACK_APOLOGY.to_string()
                    };
                    LoopState::Done {
                        answer,
                        exit: LoopExit::Fallback,
                    }
                }
                LoopState::Done { answer, exit } => {
                    return Ok(AgentOutcome {
                        answer,
                        exit,
                        completions,
                        tool_calls,
                    });
                }
            };
        }
    }
}
