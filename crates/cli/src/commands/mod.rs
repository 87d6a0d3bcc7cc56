//! Subcommand implementations and the wiring they share.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use summonbot_agent::{AgentLoop, AgentSettings, PromptTemplates, ThreadAnswerer, TranscriptBuilder};
use summonbot_config::AppConfig;
use summonbot_core::Trigger;
use summonbot_providers::OpenAiCompatProvider;
use summonbot_tools::ToolDispatcher;

pub mod ask;
pub mod config_cmd;
pub mod doctor;
pub mod run;
pub mod tool;

pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn Error>> {
    let config = AppConfig::load_with_env(&config_file(path))
        .map_err(|e| format!("Failed to load config: {e}"))?;
    Ok(config)
}

/// Provider, tools, trigger and prompts, assembled from config.
pub fn build_answerer(config: &AppConfig) -> Result<ThreadAnswerer, Box<dyn Error>> {
    let provider = Arc::new(OpenAiCompatProvider::from_config(&config.provider)?);
    let tools = Arc::new(ToolDispatcher::from_config(config)?);
    let trigger = Trigger::new(&config.listener.trigger_names)?;
    let prompts = PromptTemplates::load(config.provider.system_prompt_path.as_deref())?;
    let agent = AgentLoop::new(provider, tools, AgentSettings::from_config(&config.provider));
    Ok(ThreadAnswerer::new(
        trigger,
        TranscriptBuilder::new(&config.transcript),
        prompts,
        agent,
    ))
}
