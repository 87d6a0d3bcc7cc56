//! Typed tool invocations.
//!
//! The model names a tool and sends loosely-typed JSON. Parsing here is
//! deliberately forgiving: a field of the wrong type is treated as absent,
//! and required fields are checked by the tools themselves so the model
//! gets a readable error.

use serde_json::Value;

pub const WEB_SEARCH: &str = "web_search";
pub const WEB_FETCH: &str = "web_fetch";
pub const WEB_RENDER: &str = "web_render";

/// Recency filters the search backend understands.
pub const TIME_RANGES: &[&str] = &["day", "week", "month", "year"];

/// Search categories advertised to the model.
pub const CATEGORIES: &[&str] = &[
    "general", "images", "videos", "news", "map", "music", "it", "science", "files",
    "social media",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    Search(SearchArgs),
    Fetch(FetchArgs),
    Render(RenderArgs),
    Unknown(String),
}

impl ToolInvocation {
    pub fn parse(name: &str, arguments: &Value) -> Self {
        match name {
            WEB_SEARCH => Self::Search(SearchArgs::from_value(arguments)),
            WEB_FETCH => Self::Fetch(FetchArgs::from_value(arguments)),
            WEB_RENDER => Self::Render(RenderArgs::from_value(arguments)),
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn tool_name(&self) -> &str {
        match self {
            Self::Search(_) => WEB_SEARCH,
            Self::Fetch(_) => WEB_FETCH,
            Self::Render(_) => WEB_RENDER,
            Self::Unknown(name) => name,
        }
    }
}

fn string_field(args: &Value, key: &str) -> Option<String> {
    match args.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchArgs {
    pub query: String,
    pub categories: Vec<String>,
    pub time_range: Option<String>,
    pub language: Option<String>,
    pub pageno: u32,
    pub max_results: Option<i64>,
}

impl SearchArgs {
    pub fn from_value(args: &Value) -> Self {
        let categories = args
            .get("categories")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let time_range = args
            .get("time_range")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| TIME_RANGES.contains(&s.as_str()));

        let language = args
            .get("language")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let pageno = args
            .get("pageno")
            .and_then(Value::as_i64)
            .map(|p| p.clamp(1, u32::MAX as i64) as u32)
            .unwrap_or(1);

        Self {
            query: string_field(args, "query").unwrap_or_default().trim().to_string(),
            categories,
            time_range,
            language,
            pageno,
            max_results: args.get("max_results").and_then(Value::as_i64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchArgs {
    pub url: String,
    pub include_links: bool,
    pub max_chars: Option<i64>,
}

impl FetchArgs {
    pub fn from_value(args: &Value) -> Self {
        Self {
            url: string_field(args, "url").unwrap_or_default().trim().to_string(),
            include_links: args.get("include_links").and_then(Value::as_bool).unwrap_or(true),
            max_chars: args.get("max_chars").and_then(Value::as_i64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderArgs {
    pub page: FetchArgs,
    /// Extra settle time after navigation, in seconds
    pub wait_seconds: f64,
}

impl RenderArgs {
    pub fn from_value(args: &Value) -> Self {
        let wait_seconds = args
            .get("wait_seconds")
            .and_then(Value::as_f64)
            .filter(|w| w.is_finite() && *w >= 0.0)
            .unwrap_or(0.0);
        Self {
            page: FetchArgs::from_value(args),
            wait_seconds,
        }
    }
}

/// Reject empty and non-http(s) URLs before any network call.
pub fn validate_url(url: &str) -> Result<(), summonbot_core::ToolError> {
    use summonbot_core::ToolError;
    if url.is_empty() {
        return Err(ToolError::InvalidArguments("url is required".into()));
    }
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(ToolError::InvalidArguments(
            "url must start with http:// or https://".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn routes_known_names() {
        assert!(matches!(
            ToolInvocation::parse("web_search", &json!({"query": "q"})),
            ToolInvocation::Search(_)
        ));
        assert!(matches!(
            ToolInvocation::parse("web_fetch", &json!({})),
            ToolInvocation::Fetch(_)
        ));
        assert!(matches!(
            ToolInvocation::parse("web_render", &json!({})),
            ToolInvocation::Render(_)
        ));
        let unknown = ToolInvocation::parse("delete_everything", &json!({}));
        assert_eq!(unknown, ToolInvocation::Unknown("delete_everything".into()));
        assert_eq!(unknown.tool_name(), "delete_everything");
    }

    #[test]
    fn search_args_ignore_wrong_types() {
        let args = SearchArgs::from_value(&json!({
            "query": "  rust async  ",
            "categories": ["news", 3, "it"],
            "time_range": "Week",
            "language": 12,
            "pageno": 0,
            "max_results": "lots"
        }));
        assert_eq!(args.query, "rust async");
        assert_eq!(args.categories, vec!["news", "it"]);
        assert_eq!(args.time_range.as_deref(), Some("week"));
        assert_eq!(args.language, None);
        assert_eq!(args.pageno, 1);
        assert_eq!(args.max_results, None);
    }

    #[test]
    fn unsupported_time_range_is_dropped() {
        let args = SearchArgs::from_value(&json!({"query": "q", "time_range": "decade"}));
        assert_eq!(args.time_range, None);
    }

    #[test]
    fn fetch_args_default_to_including_links() {
        let args = FetchArgs::from_value(&json!({"url": "https://a.example", "include_links": "no"}));
        assert!(args.include_links);
        assert_eq!(args.max_chars, None);
    }

    #[test]
    fn render_wait_rejects_negative_values() {
        let args = RenderArgs::from_value(&json!({"url": "https://a.example", "wait_seconds": -3}));
        assert_eq!(args.wait_seconds, 0.0);
        let args = RenderArgs::from_value(&json!({"url": "https://a.example", "wait_seconds": 2.5}));
        assert_eq!(args.wait_seconds, 2.5);
    }

    #[test]
    fn url_validation() {
        assert_eq!(validate_url("").unwrap_err().to_string(), "url is required");
        assert_eq!(
            validate_url("ftp://x").unwrap_err().to_string(),
            "url must start with http:// or https://"
        );
        assert!(validate_url("https://example.com").is_ok());
    }
}
