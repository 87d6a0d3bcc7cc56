//! # summonbot core
//!
//! Domain types, traits, and error definitions shared by every summonbot crate.
//! Nothing in here talks to the network; it defines the model that the
//! provider, tools, agent, and platform crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: chat messages exchanged with the model, including image parts
//! - [`provider`]: the `Provider` trait and its request/response types
//! - [`tool`]: tool calls, tool results, and the `ToolDispatch` seam
//! - [`thread`]: comments, submissions, and the `Platform` trait
//! - [`trigger`]: detection of the summon phrase at the start of a comment
//! - [`responder`]: the `Responder` trait the listener drives

pub mod error;
pub mod message;
pub mod provider;
pub mod responder;
pub mod thread;
pub mod tool;
pub mod trigger;

// Re-export key types at crate root for ergonomics
pub use error::{Error, PlatformError, ProviderError, Result, ToolError};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolChoice, ToolDefinition, Usage};
pub use responder::Responder;
pub use thread::{Comment, CommentStream, GalleryItem, Platform, Submission, Thread};
pub use tool::{ToolCall, ToolDispatch, ToolFailure, ToolResult};
pub use trigger::Trigger;
