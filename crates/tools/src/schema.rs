//! Tool definitions advertised to the model.

use serde_json::json;
use summonbot_core::ToolDefinition;

use crate::invocation::{CATEGORIES, TIME_RANGES, WEB_FETCH, WEB_RENDER, WEB_SEARCH};

fn search_definition(hard_max_results: usize) -> ToolDefinition {
    ToolDefinition {
        name: WEB_SEARCH.into(),
        description: "Search the web using the local SearXNG instance.".into(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query string."
                },
                "categories": {
                    "type": "array",
                    "items": { "type": "string", "enum": CATEGORIES },
                    "description": "Optional SearXNG categories list. Use only supported values."
                },
                "time_range": {
                    "type": "string",
                    "enum": TIME_RANGES,
                    "description": "Optional recency filter."
                },
                "language": {
                    "type": "string",
                    "description": "Optional language code like en-US."
                },
                "pageno": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Optional result page number."
                },
                "max_results": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": hard_max_results,
                    "description": "Result cap."
                }
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn page_properties(min_chars: usize, max_chars: usize) -> serde_json::Map<String, serde_json::Value> {
    let props = json!({
        "url": {
            "type": "string",
            "description": "Absolute URL to open (http or https)."
        },
        "include_links": {
            "type": "boolean",
            "description": "Whether to include extracted links. Defaults to true."
        },
        "max_chars": {
            "type": "integer",
            "minimum": min_chars,
            "maximum": max_chars,
            "description": "Maximum number of content characters to return."
        }
    });
    match props {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn fetch_definition(min_chars: usize, max_chars: usize) -> ToolDefinition {
    ToolDefinition {
        name: WEB_FETCH.into(),
        description: "Fetch a URL over plain HTTP and return its readable text. No JavaScript \
                      is executed. Good for articles, docs, APIs, and any page that does not \
                      need client-side rendering."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": page_properties(min_chars, max_chars),
            "required": ["url"],
            "additionalProperties": false
        }),
    }
}

fn render_definition(min_chars: usize, max_chars: usize, max_wait: f64) -> ToolDefinition {
    let mut props = page_properties(min_chars, max_chars);
    props.insert(
        "wait_seconds".into(),
        json!({
            "type": "number",
            "minimum": 0,
            "maximum": max_wait,
            "description": "Extra seconds to wait after load for lazy content."
        }),
    );
    ToolDefinition {
        name: WEB_RENDER.into(),
        description: "Render a URL in a headless browser and return the fully rendered page \
                      text. Use this for JavaScript-heavy pages, pages that returned little or \
                      no content from web_fetch, or sites that block simple HTTP requests. \
                      Slower than web_fetch, so prefer web_fetch for most URLs."
            .into(),
        parameters: json!({
            "type": "object",
            "properties": props,
            "required": ["url"],
            "additionalProperties": false
        }),
    }
}

/// Limits that show up in the schemas.
#[derive(Debug, Clone, Copy)]
pub struct SchemaLimits {
    pub hard_max_results: usize,
    pub min_max_chars: usize,
    pub max_max_chars: usize,
    pub max_wait_seconds: f64,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            hard_max_results: 10,
            min_max_chars: 500,
            max_max_chars: 20_000,
            max_wait_seconds: 10.0,
        }
    }
}

/// The three tool definitions, in the order the model sees them.
pub fn tool_definitions(limits: SchemaLimits) -> Vec<ToolDefinition> {
    vec![
        search_definition(limits.hard_max_results),
        fetch_definition(limits.min_max_chars, limits.max_max_chars),
        render_definition(limits.min_max_chars, limits.max_max_chars, limits.max_wait_seconds),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_tools_with_required_fields() {
        let defs = tool_definitions(SchemaLimits::default());
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["web_search", "web_fetch", "web_render"]);

        assert_eq!(defs[0].parameters["required"], json!(["query"]));
        assert_eq!(defs[1].parameters["required"], json!(["url"]));
        assert_eq!(defs[2].parameters["required"], json!(["url"]));
    }

    #[test]
    fn limits_flow_into_schemas() {
        let defs = tool_definitions(SchemaLimits::default());
        let search = &defs[0].parameters["properties"];
        assert_eq!(search["max_results"]["maximum"], 10);
        assert_eq!(search["time_range"]["enum"], json!(["day", "week", "month", "year"]));
        assert_eq!(search["categories"]["items"]["enum"].as_array().unwrap().len(), 10);

        let fetch = &defs[1].parameters["properties"];
        assert_eq!(fetch["max_chars"]["minimum"], 500);
        assert_eq!(fetch["max_chars"]["maximum"], 20_000);
        assert!(fetch.get("wait_seconds").is_none());

        let render = &defs[2].parameters["properties"];
        assert_eq!(render["wait_seconds"]["maximum"], 10.0);
        assert_eq!(render["include_links"]["type"], "boolean");
    }
}
