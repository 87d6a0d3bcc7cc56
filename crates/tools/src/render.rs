//! Headless-browser page retrieval for pages that need JavaScript.
//!
//! The browser sits behind [`PageRenderer`]. Builds without the `browser`
//! feature, or with rendering disabled in config, get an
//! [`UnavailableRenderer`] that answers every request with a structured
//! "not available" error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use summonbot_config::{FetchConfig, RenderConfig};
use summonbot_core::ToolError;
use tracing::debug;

use crate::cache::{CacheKey, CacheKind, RetrievalCache};
use crate::extract::{ContentExtractor, extract_links};
use crate::fetch::clamp_max_chars;
use crate::invocation::{RenderArgs, validate_url};
use crate::page::{PageOutput, PageSnapshot};

/// Fully rendered HTML of one page load.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub final_url: String,
    pub status_code: Option<u16>,
    pub html: String,
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Navigate, wait for the network to settle, then wait `extra_wait`
    /// more before capturing the DOM.
    async fn render(&self, url: &str, extra_wait: Duration) -> Result<RenderedPage, ToolError>;
}

pub struct UnavailableRenderer {
    reason: String,
}

impl UnavailableRenderer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl PageRenderer for UnavailableRenderer {
    async fn render(&self, url: &str, _extra_wait: Duration) -> Result<RenderedPage, ToolError> {
        Err(ToolError::RenderUnavailable {
            url: url.to_string(),
            reason: self.reason.clone(),
        })
    }
}

/// The renderer this build can offer for the given settings.
pub fn default_renderer(render: &RenderConfig, fetch: &FetchConfig) -> Arc<dyn PageRenderer> {
    if !render.enabled {
        return Arc::new(UnavailableRenderer::new("disabled in configuration"));
    }
    #[cfg(feature = "browser")]
    {
        Arc::new(chromium::ChromiumRenderer::new(render, &fetch.user_agent))
    }
    #[cfg(not(feature = "browser"))]
    {
        let _ = fetch;
        Arc::new(UnavailableRenderer::new(
            "summonbot was built without the `browser` feature",
        ))
    }
}

pub struct RenderTool {
    renderer: Arc<dyn PageRenderer>,
    fetch_config: FetchConfig,
    max_wait_seconds: f64,
    cache: Arc<RetrievalCache>,
    extractor: Arc<ContentExtractor>,
}

impl RenderTool {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        render_config: &RenderConfig,
        fetch_config: FetchConfig,
        cache: Arc<RetrievalCache>,
        extractor: Arc<ContentExtractor>,
    ) -> Self {
        Self {
            renderer,
            fetch_config,
            max_wait_seconds: render_config
                .max_wait_seconds
                .clamp(0.0, summonbot_config::MAX_RENDER_WAIT_SECONDS),
            cache,
            extractor,
        }
    }

    pub async fn render(&self, args: &RenderArgs) -> Result<PageOutput, ToolError> {
        let page_args = &args.page;
        validate_url(&page_args.url)?;
        let max_chars = clamp_max_chars(page_args.max_chars, &self.fetch_config);
        let wait = Duration::try_from_secs_f64(args.wait_seconds.clamp(0.0, self.max_wait_seconds))
            .unwrap_or(Duration::ZERO);

        let key = CacheKey::new(CacheKind::Render, &page_args.url);
        if let Some(page) = self.cache.get(&key) {
            debug!(url = %page_args.url, "Render cache hit");
            return Ok(page.excerpt(max_chars, page_args.include_links));
        }

        let rendered = self.renderer.render(&page_args.url, wait).await?;
        let extracted = self.extractor.extract(&rendered.html, &rendered.final_url);
        let page = PageSnapshot {
            url: page_args.url.clone(),
            links: extract_links(&rendered.html, &rendered.final_url),
            final_url: rendered.final_url,
            status_code: rendered.status_code,
            content_type: None,
            title: extracted.title,
            full_text: extracted.text,
            bytes_truncated: None,
        };

        self.cache.insert(key, page.clone());
        Ok(page.excerpt(max_chars, page_args.include_links))
    }
}

/// Lifecycle event name Chromium emits once a page has had no network
/// activity for 500ms.
const NETWORK_IDLE: &str = "networkIdle";

/// Wait until `events` (loader id, lifecycle name) reports network idle for
/// `loader`, or until `max_wait` passes. `None` accepts any loader.
/// Returns whether idle was seen.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
async fn wait_for_network_idle<S>(mut events: S, loader: Option<&str>, max_wait: Duration) -> bool
where
    S: futures::Stream<Item = (String, String)> + Unpin,
{
    use futures::StreamExt;

    let idle = async {
        while let Some((loader_id, name)) = events.next().await {
            if name == NETWORK_IDLE && loader.is_none_or(|l| l == loader_id) {
                return true;
            }
        }
        false
    };
    tokio::time::timeout(max_wait, idle).await.unwrap_or(false)
}

#[cfg(feature = "browser")]
mod chromium {
    use std::path::PathBuf;
    use std::time::Duration;

    use async_trait::async_trait;
    use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::{
        EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
    };
    use chromiumoxide::{Browser, BrowserConfig};
    use futures::StreamExt;
    use summonbot_config::RenderConfig;
    use summonbot_core::ToolError;
    use tracing::{debug, warn};

    use super::{PageRenderer, RenderedPage, wait_for_network_idle};

    /// Launches a fresh headless Chromium per request.
    pub struct ChromiumRenderer {
        executable: Option<PathBuf>,
        user_agent: String,
        navigation_timeout: Duration,
        idle_timeout: Duration,
    }

    impl ChromiumRenderer {
        pub fn new(config: &RenderConfig, user_agent: &str) -> Self {
            Self {
                executable: config.chrome_executable.clone(),
                user_agent: user_agent.to_string(),
                navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
                idle_timeout: Duration::try_from_secs_f64(config.max_wait_seconds.max(0.0))
                    .unwrap_or(Duration::ZERO),
            }
        }

        async fn launch(&self, url: &str) -> Result<(Browser, chromiumoxide::Handler), ToolError> {
            let unavailable = |reason: String| ToolError::RenderUnavailable {
                url: url.to_string(),
                reason,
            };
            let mut builder = BrowserConfig::builder().no_sandbox();
            if let Some(path) = &self.executable {
                builder = builder.chrome_executable(path);
            }
            let config = builder.build().map_err(unavailable)?;
            Browser::launch(config)
                .await
                .map_err(|e| unavailable(e.to_string()))
        }
    }

    #[async_trait]
    impl PageRenderer for ChromiumRenderer {
        async fn render(&self, url: &str, extra_wait: Duration) -> Result<RenderedPage, ToolError> {
            let (mut browser, mut handler) = self.launch(url).await?;
            let events = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let render_error = |reason: String| ToolError::Render {
                url: url.to_string(),
                reason,
            };

            let load = async {
                let page = browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| render_error(e.to_string()))?;
                page.set_user_agent(SetUserAgentOverrideParams::new(self.user_agent.clone()))
                    .await
                    .map_err(|e| render_error(e.to_string()))?;
                page.execute(SetLifecycleEventsEnabledParams::new(true))
                    .await
                    .map_err(|e| render_error(e.to_string()))?;
                let lifecycle = page
                    .event_listener::<EventLifecycleEvent>()
                    .await
                    .map_err(|e| render_error(e.to_string()))?
                    .map(|event| (event.loader_id.inner().clone(), event.name.clone()));

                let navigation = page
                    .execute(NavigateParams::new(url))
                    .await
                    .map_err(|e| render_error(e.to_string()))?;
                if let Some(reason) = navigation.result.error_text.clone() {
                    return Err(render_error(reason));
                }
                let loader = navigation.result.loader_id.as_ref().map(|id| id.inner().as_str());
                if !wait_for_network_idle(lifecycle, loader, self.idle_timeout).await {
                    debug!(url, "Network never went idle, capturing the DOM as is");
                }
                if !extra_wait.is_zero() {
                    tokio::time::sleep(extra_wait).await;
                }
                let html = page.content().await.map_err(|e| render_error(e.to_string()))?;
                let final_url = page
                    .url()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| url.to_string());
                Ok(RenderedPage {
                    final_url,
                    status_code: None,
                    html,
                })
            };

            let budget = self.navigation_timeout + self.idle_timeout + extra_wait;
            let result = match tokio::time::timeout(budget, load).await {
                Ok(result) => result,
                Err(_) => Err(render_error(format!(
                    "navigation timed out after {}s",
                    budget.as_secs()
                ))),
            };

            if let Err(e) = browser.close().await {
                warn!(url, error = %e, "Failed to close browser");
            }
            let _ = browser.wait().await;
            events.abort();
            debug!(url, ok = result.is_ok(), "Rendered page");
            result
        }
    }
}
