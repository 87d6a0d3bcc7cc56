//! Retrieval tools for the summonbot agent.
//!
//! Three tools are offered to the model: `web_search` (SearXNG),
//! `web_fetch` (plain HTTP) and `web_render` (headless browser, behind the
//! `browser` feature). Fetch and render share one [`RetrievalCache`] and one
//! [`ContentExtractor`]. [`ToolDispatcher`] routes calls and turns every
//! failure, panics included, into a [`summonbot_core::ToolResult`].

pub mod cache;
pub mod dispatcher;
pub mod extract;
pub mod fetch;
pub mod invocation;
pub mod page;
pub mod render;
pub mod schema;
pub mod search;
pub mod summary;

pub use cache::{CacheKey, CacheKind, RetrievalCache};
pub use dispatcher::ToolDispatcher;
pub use extract::{ContentExtractor, MainContentStrategy, TagStripStrategy, TextStrategy};
pub use fetch::FetchTool;
pub use invocation::{FetchArgs, RenderArgs, SearchArgs, ToolInvocation};
pub use page::{PageOutput, PageSnapshot};
pub use render::{PageRenderer, RenderTool, RenderedPage, UnavailableRenderer};
pub use schema::{SchemaLimits, tool_definitions};
pub use search::{SearchHit, SearchOutput, SearchTool};
pub use summary::summarize;
