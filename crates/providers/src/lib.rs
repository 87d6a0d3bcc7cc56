//! Chat-completion providers for summonbot.
//!
//! All providers implement the `summonbot_core::Provider` trait. The
//! OpenAI-compatible provider covers OpenRouter, OpenAI, and local gateways.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
