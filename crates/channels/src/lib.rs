//! Comment listening for summonbot.
//!
//! - [`listener`]: the long-running loop that reads the comment stream,
//!   answers summons, retries replies, and reconnects with backoff
//! - [`reddit`]: the Reddit implementation of [`summonbot_core::Platform`]

pub mod listener;
pub mod reddit;

pub use listener::{
    CommentListener, ListenerExit, ListenerSettings, ListenerStats, StatsSnapshot, reply_backoff,
};
pub use reddit::{RedditEndpoints, RedditPlatform};
