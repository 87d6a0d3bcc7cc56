//! Error types for the summonbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] wraps them all.

use thiserror::Error;

/// The top-level error type for summonbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Platform errors ---
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Failures of the discussion platform (stream, lookups, replies).
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("Comment stream failed: {0}")]
    Stream(String),

    #[error("Reply to {target} failed: {reason}")]
    Reply { target: String, reason: String },

    #[error("Lookup of {id} failed: {reason}")]
    Lookup { id: String, reason: String },

    #[error("Platform authentication failed: {0}")]
    Auth(String),

    #[error("Platform not configured: {0}")]
    NotConfigured(String),
}

/// Failures raised while running one of the agent's tools.
///
/// The `Display` text is what the model sees in the tool message, so it is
/// kept short and free of Rust type names.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),

    #[error("HTTP request failed: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP request failed: status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("browser rendering is not available: {reason}")]
    RenderUnavailable { url: String, reason: String },

    #[error("Browser render failed: {reason}")]
    Render { url: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool_name} execution failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// The URL the failing request targeted, when there was one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Network { url, .. }
            | Self::HttpStatus { url, .. }
            | Self::RenderUnavailable { url, .. }
            | Self::Render { url, .. } => Some(url),
            _ => None,
        }
    }
}
