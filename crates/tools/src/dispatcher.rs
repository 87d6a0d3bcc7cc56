//! Routes tool calls to the search, fetch and render tools.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use summonbot_config::AppConfig;
use summonbot_core::{ToolCall, ToolDefinition, ToolDispatch, ToolError, ToolResult};
use tracing::warn;

use crate::cache::RetrievalCache;
use crate::extract::ContentExtractor;
use crate::fetch::FetchTool;
use crate::invocation::ToolInvocation;
use crate::render::{PageRenderer, RenderTool, default_renderer};
use crate::schema::{SchemaLimits, tool_definitions};
use crate::search::SearchTool;

pub struct ToolDispatcher {
    search: SearchTool,
    fetch: FetchTool,
    render: RenderTool,
    cache: Arc<RetrievalCache>,
    limits: SchemaLimits,
}

impl ToolDispatcher {
    pub fn from_config(config: &AppConfig) -> Result<Self, ToolError> {
        let renderer = default_renderer(&config.render, &config.fetch);
        Self::with_renderer(config, renderer)
    }

    /// Build with a specific page renderer.
    pub fn with_renderer(
        config: &AppConfig,
        renderer: Arc<dyn PageRenderer>,
    ) -> Result<Self, ToolError> {
        let cache = Arc::new(RetrievalCache::new(Duration::from_secs(
            config.fetch.cache_ttl_secs,
        )));
        let extractor = Arc::new(ContentExtractor::default());

        let search = SearchTool::new(config.search.clone())?;
        let fetch = FetchTool::new(config.fetch.clone(), cache.clone(), extractor.clone())?;
        let render = RenderTool::new(
            renderer,
            &config.render,
            config.fetch.clone(),
            cache.clone(),
            extractor,
        );

        let limits = SchemaLimits {
            hard_max_results: config.search.hard_max_results,
            min_max_chars: config.fetch.min_max_chars,
            max_max_chars: config.fetch.default_max_chars,
            max_wait_seconds: config.render.max_wait_seconds,
        };

        Ok(Self {
            search,
            fetch,
            render,
            cache,
            limits,
        })
    }

    /// Shared by fetch and render.
    pub fn cache(&self) -> &RetrievalCache {
        &self.cache
    }

    async fn run(&self, invocation: &ToolInvocation) -> Result<Value, ToolError> {
        match invocation {
            ToolInvocation::Search(args) => to_payload(invocation, self.search.search(args).await?),
            ToolInvocation::Fetch(args) => to_payload(invocation, self.fetch.fetch(args).await?),
            ToolInvocation::Render(args) => to_payload(invocation, self.render.render(args).await?),
            ToolInvocation::Unknown(name) => Err(ToolError::UnknownTool(name.clone())),
        }
    }
}

fn to_payload(invocation: &ToolInvocation, output: impl Serialize) -> Result<Value, ToolError> {
    serde_json::to_value(output).map_err(|e| ToolError::ExecutionFailed {
        tool_name: invocation.tool_name().to_string(),
        reason: e.to_string(),
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[async_trait]
impl ToolDispatch for ToolDispatcher {
    fn definitions(&self) -> Vec<ToolDefinition> {
        tool_definitions(self.limits)
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let invocation = ToolInvocation::parse(&call.name, &call.arguments);

        match AssertUnwindSafe(self.run(&invocation)).catch_unwind().await {
            Ok(Ok(payload)) => ToolResult::Success(payload),
            Ok(Err(err)) => err.into(),
            Err(panic) => {
                let reason = panic_message(panic);
                warn!(tool = invocation.tool_name(), %reason, "Tool panicked");
                ToolError::ExecutionFailed {
                    tool_name: invocation.tool_name().to_string(),
                    reason,
                }
                .into()
            }
        }
    }
}
