//! `summonbot tool`: run one web tool through the dispatcher.

use std::error::Error;

use clap::Subcommand;
use serde_json::{Map, Value, json};
use summonbot_config::AppConfig;
use summonbot_core::{ToolCall, ToolDispatch};
use summonbot_tools::{ToolDispatcher, summarize};
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum ToolCommand {
    /// Query the SearXNG instance
    Search {
        query: String,

        #[arg(long)]
        max_results: Option<i64>,

        /// day, week, month or year
        #[arg(long)]
        time_range: Option<String>,

        /// Comma-separated categories, e.g. "news,it"
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,
    },

    /// Fetch a page over HTTP
    Fetch {
        url: String,

        #[arg(long)]
        max_chars: Option<i64>,

        /// Leave out the extracted links
        #[arg(long)]
        no_links: bool,
    },

    /// Render a page in the headless browser
    Render {
        url: String,

        /// Extra seconds to wait after load
        #[arg(long, default_value_t = 0.0)]
        wait: f64,

        #[arg(long)]
        max_chars: Option<i64>,

        #[arg(long)]
        no_links: bool,
    },
}

impl ToolCommand {
    /// The call the model would have made.
    pub fn to_call(&self) -> ToolCall {
        let (name, arguments) = match self {
            Self::Search {
                query,
                max_results,
                time_range,
                categories,
            } => {
                let mut args = Map::new();
                args.insert("query".into(), json!(query));
                if let Some(n) = max_results {
                    args.insert("max_results".into(), json!(n));
                }
                if let Some(range) = time_range {
                    args.insert("time_range".into(), json!(range));
                }
                if !categories.is_empty() {
                    args.insert("categories".into(), json!(categories));
                }
                ("web_search", Value::Object(args))
            }
            Self::Fetch {
                url,
                max_chars,
                no_links,
            } => (
                "web_fetch",
                page_args(url, *max_chars, *no_links, None),
            ),
            Self::Render {
                url,
                wait,
                max_chars,
                no_links,
            } => (
                "web_render",
                page_args(url, *max_chars, *no_links, Some(*wait)),
            ),
        };
        ToolCall {
            id: "cli".into(),
            name: name.into(),
            arguments,
        }
    }
}

fn page_args(url: &str, max_chars: Option<i64>, no_links: bool, wait: Option<f64>) -> Value {
    let mut args = Map::new();
    args.insert("url".into(), json!(url));
    args.insert("include_links".into(), json!(!no_links));
    if let Some(n) = max_chars {
        args.insert("max_chars".into(), json!(n));
    }
    if let Some(w) = wait {
        args.insert("wait_seconds".into(), json!(w));
    }
    Value::Object(args)
}

pub async fn run(config: AppConfig, command: ToolCommand) -> Result<(), Box<dyn Error>> {
    let dispatcher = ToolDispatcher::from_config(&config)?;
    let call = command.to_call();
    info!("Tool call: {}({})", call.name, call.arguments);

    let result = dispatcher.dispatch(&call).await;
    info!("Tool result: {} -> {}", call.name, summarize(&call.name, &result));
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
