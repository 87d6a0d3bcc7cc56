//! Summon-phrase detection.
//!
//! A comment summons the bot when it *starts* with a mention of one of the
//! bot's names, written as `u/name`, `[u/name` or `@name`, in any case.

use regex::{Regex, RegexBuilder};

/// Placeholder question used when the comment is only the mention.
pub const NO_EXPLICIT_QUESTION: &str = "(no explicit question)";

/// Names the bot answers to when none are configured.
pub const DEFAULT_NAMES: &[&str] = &["grok", "ai", "gpt", "gemini", "chatgpt"];

#[derive(Debug, Clone)]
pub struct Trigger {
    pattern: Regex,
}

impl Trigger {
    /// Build a trigger for the given names. Names are matched literally.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, regex::Error> {
        let alternatives = names
            .iter()
            .map(|n| regex::escape(n.as_ref().trim()))
            .filter(|n| !n.is_empty())
            .collect::<Vec<_>>()
            .join("|");
        let pattern = RegexBuilder::new(&format!(r"^\s*(?:\[?u/|@)(?:{alternatives})\b"))
            .case_insensitive(true)
            .build()?;
        Ok(Self { pattern })
    }

    /// Whether `body` begins with a summon.
    pub fn matches(&self, body: &str) -> bool {
        self.pattern.is_match(body)
    }

    /// The question that follows the summon, or a placeholder when empty.
    pub fn question(&self, body: &str) -> String {
        let stripped = self.pattern.replace(body, "");
        let stripped = stripped.trim();
        if stripped.is_empty() {
            NO_EXPLICIT_QUESTION.to_string()
        } else {
            stripped.to_string()
        }
    }
}
