//! One-line tool result summaries for the log.

use summonbot_core::ToolResult;

use crate::invocation::{WEB_FETCH, WEB_RENDER, WEB_SEARCH};

const OTHER_SUMMARY_CHARS: usize = 300;

fn field_or_none(result: &ToolResult, key: &str) -> String {
    match result.field(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => "None".into(),
        Some(other) => other.to_string(),
    }
}

pub fn summarize(tool_name: &str, result: &ToolResult) -> String {
    match tool_name {
        WEB_SEARCH => format!(
            "result_count={} query={:?}",
            result
                .field("result_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            result
                .field("query")
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default()
        ),
        WEB_FETCH | WEB_RENDER => format!(
            "status={} text_length={} title={:?} error={}",
            field_or_none(result, "status_code"),
            field_or_none(result, "text_length"),
            result
                .field("title")
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default(),
            field_or_none(result, "error"),
        ),
        _ => result.to_content().chars().take(OTHER_SUMMARY_CHARS).collect(),
    }
}
