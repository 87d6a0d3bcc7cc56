//! Configuration loading, validation, and management for summonbot.
//!
//! Loads configuration from `~/.summonbot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.summonbot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat-completions backend
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Metasearch backend used by `web_search`
    #[serde(default)]
    pub search: SearchConfig,

    /// Plain HTTP retrieval used by `web_fetch`
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Headless browser retrieval used by `web_render`
    #[serde(default)]
    pub render: RenderConfig,

    /// Thread transcript limits
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// Comment listener behaviour
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Reddit API credentials
    #[serde(default)]
    pub reddit: RedditConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

// ── Provider ──

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    /// Reasoning effort hint passed through to the backend
    #[serde(default = "default_reasoning_effort", skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,

    /// Completion steps that may request tools before the fallback answer
    #[serde(default = "default_max_tool_steps")]
    pub max_tool_steps: usize,

    /// Sent as `HTTP-Referer` for OpenRouter attribution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,

    /// Sent as `X-Title` for OpenRouter attribution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_title: Option<String>,

    /// Replace the built-in system prompt with the contents of this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_provider_timeout() -> u64 {
    120
}
fn default_reasoning_effort() -> Option<String> {
    Some("high".into())
}
fn default_max_tool_steps() -> usize {
    16
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_provider_timeout(),
            reasoning_effort: default_reasoning_effort(),
            max_tool_steps: default_max_tool_steps(),
            referer: None,
            app_title: None,
            system_prompt_path: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("reasoning_effort", &self.reasoning_effort)
            .field("max_tool_steps", &self.max_tool_steps)
            .field("referer", &self.referer)
            .field("app_title", &self.app_title)
            .field("system_prompt_path", &self.system_prompt_path)
            .finish()
    }
}

// ── Search ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// SearXNG instance root, e.g. `https://127.0.0.1:8888`
    #[serde(default)]
    pub base_url: String,

    /// Retries after the first failed attempt
    #[serde(default = "default_search_retries")]
    pub max_retries: u32,

    #[serde(default = "default_search_retry_delay")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_results")]
    pub default_max_results: usize,

    #[serde(default = "default_hard_max_results")]
    pub hard_max_results: usize,

    #[serde(default = "default_language")]
    pub default_language: String,

    /// Local instances usually run with self-signed certificates
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

fn default_search_retries() -> u32 {
    2
}
fn default_search_retry_delay() -> u64 {
    1
}
fn default_search_timeout() -> u64 {
    10
}
fn default_max_results() -> usize {
    5
}
fn default_hard_max_results() -> usize {
    10
}
fn default_language() -> String {
    "en-US".into()
}

impl SearchConfig {
    /// Base URL without a trailing slash.
    pub fn endpoint_base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            max_retries: default_search_retries(),
            retry_delay_secs: default_search_retry_delay(),
            timeout_secs: default_search_timeout(),
            default_max_results: default_max_results(),
            hard_max_results: default_hard_max_results(),
            default_language: default_language(),
            accept_invalid_certs: true,
        }
    }
}

// ── Fetch ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Bytes read from a response body before the rest is discarded
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Upper bound (and default) for `max_chars`
    #[serde(default = "default_max_chars")]
    pub default_max_chars: usize,

    /// Lower bound for `max_chars`
    #[serde(default = "default_min_max_chars")]
    pub min_max_chars: usize,

    /// Lifetime of fetch and render cache entries
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_fetch_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0.0.0 Safari/537.36"
        .into()
}
fn default_fetch_timeout() -> u64 {
    15
}
fn default_max_bytes() -> usize {
    1_500_000
}
fn default_max_chars() -> usize {
    20_000
}
fn default_min_max_chars() -> usize {
    500
}
fn default_cache_ttl() -> u64 {
    300
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_fetch_user_agent(),
            timeout_secs: default_fetch_timeout(),
            max_bytes: default_max_bytes(),
            default_max_chars: default_max_chars(),
            min_max_chars: default_min_max_chars(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

// ── Render ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Chrome/Chromium binary; auto-detected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable: Option<PathBuf>,

    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Upper bound for the `wait_seconds` tool argument
    #[serde(default = "default_max_wait")]
    pub max_wait_seconds: f64,
}

fn default_navigation_timeout() -> u64 {
    30
}
/// Upper bound accepted for `render.max_wait_seconds`.
pub const MAX_RENDER_WAIT_SECONDS: f64 = 60.0;

fn default_max_wait() -> f64 {
    10.0
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chrome_executable: None,
            navigation_timeout_secs: default_navigation_timeout(),
            max_wait_seconds: default_max_wait(),
        }
    }
}

// ── Transcript ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Character budget; longer transcripts keep their tail
    #[serde(default = "default_transcript_chars")]
    pub max_chars: usize,

    #[serde(default = "default_max_images")]
    pub max_images: usize,

    /// Prefix for every quoted comment line
    #[serde(default = "default_indent")]
    pub indent: String,
}

fn default_transcript_chars() -> usize {
    40_000
}
fn default_max_images() -> usize {
    5
}
fn default_indent() -> String {
    "> ".into()
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            max_chars: default_transcript_chars(),
            max_images: default_max_images(),
            indent: default_indent(),
        }
    }
}

// ── Listener ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Communities to watch; joined with `+`
    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,

    /// Account names that summon the bot
    #[serde(default = "default_trigger_names")]
    pub trigger_names: Vec<String>,

    /// Pause after handling each summon
    #[serde(default = "default_courtesy_delay")]
    pub courtesy_delay_secs: u64,

    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Total reply attempts per summon
    #[serde(default = "default_reply_retries")]
    pub reply_retries: u32,

    /// Delay before each stream reconnect; the last value repeats
    #[serde(default = "default_stream_backoff")]
    pub stream_backoff_secs: Vec<u64>,

    /// Consecutive stream failures tolerated before giving up
    #[serde(default = "default_max_stream_retries")]
    pub max_stream_retries: u32,

    /// How often the comment feed is polled
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_subreddits() -> Vec<String> {
    vec!["all".into()]
}
fn default_trigger_names() -> Vec<String> {
    summonbot_core::trigger::DEFAULT_NAMES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_courtesy_delay() -> u64 {
    10
}
fn default_stats_interval() -> u64 {
    60
}
fn default_reply_retries() -> u32 {
    3
}
fn default_stream_backoff() -> Vec<u64> {
    vec![10, 30, 60, 120, 300]
}
fn default_max_stream_retries() -> u32 {
    5
}
fn default_poll_interval() -> u64 {
    5
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            subreddits: default_subreddits(),
            trigger_names: default_trigger_names(),
            courtesy_delay_secs: default_courtesy_delay(),
            stats_interval_secs: default_stats_interval(),
            reply_retries: default_reply_retries(),
            stream_backoff_secs: default_stream_backoff(),
            max_stream_retries: default_max_stream_retries(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

// ── Reddit ──

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for RedditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.summonbot/config.toml).
    ///
    /// Environment variables override file values; see [`AppConfig::apply_env`].
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides (highest priority).
    ///
    /// - `OPENROUTER_API_KEY`, `SUMMONBOT_MODEL`
    /// - `SEARXNG_BASE_URL`
    /// - `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, `REDDIT_USERNAME`,
    ///   `REDDIT_PASSWORD`, `USER_AGENT`
    ///
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("OPENROUTER_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(model) = var("SUMMONBOT_MODEL") {
            self.provider.model = model;
        }
        if let Some(base) = var("SEARXNG_BASE_URL") {
            self.search.base_url = base;
        }
        if let Some(v) = var("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(v);
        }
        if let Some(v) = var("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(v);
        }
        if let Some(v) = var("REDDIT_USERNAME") {
            self.reddit.username = Some(v);
        }
        if let Some(v) = var("REDDIT_PASSWORD") {
            self.reddit.password = Some(v);
        }
        if let Some(v) = var("USER_AGENT") {
            self.reddit.user_agent = Some(v);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".summonbot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.max_tool_steps == 0 {
            return Err(ConfigError::ValidationError(
                "provider.max_tool_steps must be at least 1".into(),
            ));
        }

        if self.fetch.min_max_chars > self.fetch.default_max_chars {
            return Err(ConfigError::ValidationError(
                "fetch.min_max_chars must not exceed fetch.default_max_chars".into(),
            ));
        }

        if self.search.default_max_results == 0
            || self.search.default_max_results > self.search.hard_max_results
        {
            return Err(ConfigError::ValidationError(
                "search.default_max_results must be between 1 and search.hard_max_results".into(),
            ));
        }

        if !(0.0..=MAX_RENDER_WAIT_SECONDS).contains(&self.render.max_wait_seconds) {
            return Err(ConfigError::ValidationError(format!(
                "render.max_wait_seconds must be between 0 and {MAX_RENDER_WAIT_SECONDS}"
            )));
        }

        if self.transcript.max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "transcript.max_chars must be > 0".into(),
            ));
        }

        if self.listener.reply_retries == 0 {
            return Err(ConfigError::ValidationError(
                "listener.reply_retries must be at least 1".into(),
            ));
        }

        if self.listener.stream_backoff_secs.is_empty() {
            return Err(ConfigError::ValidationError(
                "listener.stream_backoff_secs must not be empty".into(),
            ));
        }

        if self.listener.subreddits.is_empty() {
            return Err(ConfigError::ValidationError(
                "listener.subreddits must not be empty".into(),
            ));
        }

        if self.listener.trigger_names.iter().all(|n| n.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "listener.trigger_names must contain at least one name".into(),
            ));
        }

        summonbot_core::Trigger::new(&self.listener.trigger_names).map_err(|e| {
            ConfigError::ValidationError(format!("listener.trigger_names: {e}"))
        })?;

        Ok(())
    }

    /// Settings required to run the listener that are still unset.
    pub fn required_missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.provider.api_key.is_none() {
            missing.push("OPENROUTER_API_KEY");
        }
        if self.search.endpoint_base().is_empty() {
            missing.push("SEARXNG_BASE_URL");
        }
        if self.reddit.client_id.is_none() {
            missing.push("REDDIT_CLIENT_ID");
        }
        if self.reddit.client_secret.is_none() {
            missing.push("REDDIT_CLIENT_SECRET");
        }
        if self.reddit.username.is_none() {
            missing.push("REDDIT_USERNAME");
        }
        if self.reddit.password.is_none() {
            missing.push("REDDIT_PASSWORD");
        }
        if self.reddit.user_agent.is_none() {
            missing.push("USER_AGENT");
        }
        missing
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
