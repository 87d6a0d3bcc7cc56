//! Prompt rendering.
//!
//! The system prompt is a template with `{local_stamp}` and `{utc_stamp}`
//! placeholders, filled with the current time on every request. It can be
//! replaced by a file; the user prompt header is fixed.

use std::path::Path;

use chrono::{DateTime, Local, Utc};
use summonbot_core::{Error, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are summonbot, a helpful assistant that answers questions on Reddit when someone summons you.

Current date and time: {local_stamp} (local), {utc_stamp}.

You can use tools before answering:
- web_search: find current information, news, documentation, or facts you are unsure about.
- web_fetch: read a specific page over plain HTTP. Prefer this for articles, docs and APIs.
- web_render: open a page in a headless browser. Use it only for JavaScript-heavy pages or when web_fetch returned little or nothing.

Call one tool at a time. Check recent or time-sensitive claims with a search instead of guessing. \
When you have enough information, stop calling tools and write the reply.

Keep replies concise and conversational, formatted as Reddit markdown. Cite sources with plain links when you used them.";

const USER_HEADER_INTRO: &str = "\
You are summonbot, an AI assistant that helps Reddit users by replying to their comments.

Below is the full thread that led to the user's last comment. Use it to craft an accurate, concise reply. Write your final answer \
as if you were replying directly to the user on Reddit. Do not include any preamble or explanation, just provide the answer.";

#[derive(Debug, Clone)]
pub struct PromptTemplates {
    system: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    pub fn with_system(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }

    /// Load the system template from `path`, or use the built-in one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("prompt template {} could not be read: {e}", path.display()),
        })?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Config {
                message: format!("prompt template {} is empty", path.display()),
            });
        }
        Ok(Self::with_system(text))
    }

    /// Fill in the time placeholders.
    pub fn system_message(&self, now: DateTime<Utc>) -> String {
        let local = now.with_timezone(&Local);
        self.system
            .replace(
                "{local_stamp}",
                &local.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
            )
            .replace(
                "{utc_stamp}",
                &now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            )
    }

    pub fn user_message(&self, thread_text: &str, user_question: &str) -> String {
        format!(
            "{USER_HEADER_INTRO}\n\n--- BEGIN THREAD ---\n{thread_text}\n--- END OF THREAD ---\n\n\
             USER QUESTION (last comment): {user_question}"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_prompt_gets_timestamps() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        let text = PromptTemplates::default().system_message(now);
        assert!(text.contains("2025-03-14 15:09:26 UTC"));
        assert!(!text.contains("{local_stamp}"));
        assert!(!text.contains("{utc_stamp}"));
    }

    #[test]
    fn user_message_wraps_thread() {
        let text = PromptTemplates::default().user_message("SUBREDDIT: r/rust", "why?");
        assert!(text.contains("--- BEGIN THREAD ---\nSUBREDDIT: r/rust\n--- END OF THREAD ---"));
        assert!(text.ends_with("USER QUESTION (last comment): why?"));
    }

    #[test]
    fn user_header_sentences_are_not_broken() {
        let text = PromptTemplates::default().user_message("thread", "q");
        assert!(text.contains("Write your final answer as if you were replying directly"));
        assert_eq!(USER_HEADER_INTRO.lines().count(), 3);
    }

    #[test]
    fn braces_in_user_text_are_kept_verbatim() {
        let text = PromptTemplates::default().user_message("someone typed {user_question}", "{thread_text}");
        assert!(text.contains("someone typed {user_question}"));
        assert!(text.ends_with("(last comment): {thread_text}"));
    }

    #[test]
    fn template_file_overrides_default() {
        let dir = std::env::temp_dir().join(format!("summonbot-prompt-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("system.txt");
        std::fs::write(&path, "  Custom at {utc_stamp}\n").unwrap();

        let templates = PromptTemplates::load(Some(&path)).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(templates.system_message(now), "Custom at 2024-01-02 03:04:05 UTC");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_template_file_is_a_config_error() {
        let err = PromptTemplates::load(Some(Path::new("/nonexistent/summonbot/prompt.txt")))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
