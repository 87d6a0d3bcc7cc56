//! Platform trait: the abstraction over the discussion site.
//!
//! A Platform yields a live stream of comments, resolves the thread a
//! comment belongs to (its submission and ancestor chain), and posts replies.
//! The types here are plain snapshots: once fetched they are never mutated.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// A comment as observed on the stream or fetched as an ancestor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Short ID (e.g. "k2x9f1")
    pub id: String,

    /// Author username; `None` when the account was deleted
    #[serde(default)]
    pub author: Option<String>,

    /// Markdown body
    pub body: String,

    /// Community the comment was posted in, without the `r/` prefix
    pub subreddit: String,

    /// Fullname of the submission this comment belongs to (e.g. "t3_abc")
    pub link_id: String,

    /// Fullname of the parent: a comment ("t1_") or the submission ("t3_")
    pub parent_id: String,
}

impl Comment {
    /// Type-prefixed identifier used by the reply and lookup APIs.
    pub fn fullname(&self) -> String {
        format!("t1_{}", self.id)
    }

    /// Whether this comment replies directly to the submission.
    pub fn is_root(&self) -> bool {
        self.parent_id.starts_with("t3_")
    }
}

/// One entry of a gallery post's media metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GalleryItem {
    /// MIME type, e.g. "image/jpg"
    #[serde(default)]
    pub media_type: Option<String>,

    /// Element kind, e.g. "Image" or "AnimatedImage"
    #[serde(default)]
    pub kind: Option<String>,

    /// Source URL, still HTML-escaped as the API returns it
    #[serde(default)]
    pub source_url: Option<String>,
}

/// The root post of a thread.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub title: String,

    /// Site-relative permalink, e.g. "/r/rust/comments/abc/title/"
    pub permalink: String,

    /// Link target for link posts; the permalink URL for self posts
    #[serde(default)]
    pub url: Option<String>,

    /// Text post rather than a link post
    #[serde(default)]
    pub is_self: bool,

    #[serde(default)]
    pub selftext: String,

    #[serde(default)]
    pub post_hint: Option<String>,

    #[serde(default)]
    pub is_gallery: bool,

    #[serde(default)]
    pub gallery: Vec<GalleryItem>,
}

/// Everything needed to describe the conversation leading to a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub subreddit: String,
    pub submission: Submission,

    /// The triggering comment first, then each parent up to the root comment
    pub chain: Vec<Comment>,
}

/// Stream of comments. An `Err` item means the stream itself broke and
/// must be reopened.
pub type CommentStream = Pin<Box<dyn Stream<Item = Result<Comment, PlatformError>> + Send>>;

#[async_trait]
pub trait Platform: Send + Sync {
    /// A human-readable name for this platform (e.g., "reddit").
    fn name(&self) -> &str;

    /// The bot's own account name, so its comments can be skipped.
    fn own_username(&self) -> Option<&str> {
        None
    }

    /// Open a live stream of new comments.
    async fn comments(&self) -> Result<CommentStream, PlatformError>;

    /// Resolve the submission and ancestor chain for a comment.
    async fn thread(&self, comment: &Comment) -> Result<Thread, PlatformError>;

    /// Post `text` as a reply to `comment`.
    async fn reply(&self, comment: &Comment, text: &str) -> Result<(), PlatformError>;
}
