//! `summonbot ask`: answer one comment without Reddit.

use std::error::Error;

use summonbot_config::AppConfig;
use summonbot_core::{Comment, Submission, Thread};

/// A one-comment thread on a self post with no body.
pub fn synthetic_thread(text: &str, title: &str, subreddit: &str) -> Thread {
    let subreddit = subreddit.trim().trim_start_matches("r/").to_string();
    Thread {
        submission: Submission {
            id: "local".into(),
            title: title.into(),
            permalink: format!("/r/{subreddit}/comments/local/"),
            is_self: true,
            ..Submission::default()
        },
        chain: vec![Comment {
            id: "local0".into(),
            author: Some("you".into()),
            body: text.into(),
            subreddit: subreddit.clone(),
            link_id: "t3_local".into(),
            parent_id: "t3_local".into(),
        }],
        subreddit,
    }
}

pub async fn run(
    config: AppConfig,
    text: &str,
    title: &str,
    subreddit: &str,
) -> Result<(), Box<dyn Error>> {
    if config.provider.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!("  Set OPENROUTER_API_KEY or add api_key under [provider] in:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let answerer = super::build_answerer(&config)?;
    let outcome = answerer
        .answer(&synthetic_thread(text, title, subreddit))
        .await?;
    println!("{}", outcome.answer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_thread_is_a_root_comment_on_a_self_post() {
        let thread = synthetic_thread("u/grok hi", "Title", "r/rust");
        assert_eq!(thread.subreddit, "rust");
        assert_eq!(thread.submission.permalink, "/r/rust/comments/local/");
        assert!(thread.submission.is_self);
        assert_eq!(thread.chain.len(), 1);
        assert!(thread.chain[0].is_root());
        assert_eq!(thread.chain[0].body, "u/grok hi");
    }
}
