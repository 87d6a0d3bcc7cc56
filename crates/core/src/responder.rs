//! Responder trait: turns a summoning comment into reply text.

use async_trait::async_trait;

use crate::error::Result;
use crate::thread::Comment;

/// Produces the reply for a comment that matched the trigger.
///
/// The listener treats any `Err` as "nothing to post" and moves on.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, comment: &Comment) -> Result<String>;
}
