//! The summonbot agent.
//!
//! Given a resolved thread, the agent:
//!
//! 1. **Renders** the thread into a bounded transcript plus image URLs
//! 2. **Builds** the system prompt (with the current time) and user prompt
//! 3. **Runs** the bounded tool-calling loop against the provider
//! 4. **Returns** the final answer, or a best-effort fallback once the
//!    tool step budget is spent

pub mod loop_runner;
pub mod prompt;
pub mod responder;
pub mod transcript;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::{AgentLoop, AgentOutcome, AgentSettings, LoopExit};
pub use prompt::PromptTemplates;
pub use responder::{ThreadAnswerer, ThreadResponder};
pub use transcript::{Transcript, TranscriptBuilder};
