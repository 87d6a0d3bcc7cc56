//! From a summoning comment to reply text.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use summonbot_core::{Comment, Error, Message, Platform, Responder, Result, Thread, Trigger};
use tracing::info;

use crate::loop_runner::{AgentLoop, AgentOutcome};
use crate::prompt::PromptTemplates;
use crate::transcript::TranscriptBuilder;

/// Answers a resolved thread: transcript, prompts, then the agent loop.
pub struct ThreadAnswerer {
    trigger: Trigger,
    transcripts: TranscriptBuilder,
    prompts: PromptTemplates,
    agent: AgentLoop,
}

impl ThreadAnswerer {
    pub fn new(
        trigger: Trigger,
        transcripts: TranscriptBuilder,
        prompts: PromptTemplates,
        agent: AgentLoop,
    ) -> Self {
        Self {
            trigger,
            transcripts,
            prompts,
            agent,
        }
    }

    /// Answer the first comment of `thread.chain`.
    pub async fn answer(&self, thread: &Thread) -> Result<AgentOutcome> {
        let trigger_comment = thread
            .chain
            .first()
            .ok_or_else(|| Error::Internal("thread has no comments".into()))?;
        let question = self.trigger.question(&trigger_comment.body);
        let transcript = self.transcripts.build(thread);

        if transcript.images.is_empty() {
            info!("No images found or included for this thread.");
        } else {
            info!("Including {} image(s) in the prompt:", transcript.images.len());
            for url in &transcript.images {
                info!("  Image: {url}");
            }
        }

        let system = Message::system(self.prompts.system_message(Utc::now()));
        let user = Message::user(self.prompts.user_message(&transcript.text, &question))
            .with_images(transcript.images);
        self.agent.run(system, user).await
    }
}

/// The listener's [`Responder`]: looks the thread up on the platform and
/// hands it to a [`ThreadAnswerer`].
pub struct ThreadResponder {
    platform: Arc<dyn Platform>,
    answerer: ThreadAnswerer,
}

impl ThreadResponder {
    pub fn new(platform: Arc<dyn Platform>, answerer: ThreadAnswerer) -> Self {
        Self { platform, answerer }
    }
}

#[async_trait]
impl Responder for ThreadResponder {
    async fn respond(&self, comment: &Comment) -> Result<String> {
        let thread = self.platform.thread(comment).await?;
        let outcome = self.answerer.answer(&thread).await?;
        info!(
            comment_id = %comment.id,
            completions = outcome.completions,
            tool_calls = outcome.tool_calls,
            exit = ?outcome.exit,
            "Answer ready"
        );
        Ok(outcome.answer)
    }
}
