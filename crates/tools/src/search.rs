//! Web search through a SearXNG instance.
//!
//! Transient failures are retried a fixed number of times; when every
//! attempt fails the tool reports zero results instead of an error so the
//! model can carry on without search.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use summonbot_config::SearchConfig;
use summonbot_core::ToolError;
use tracing::{debug, warn};

use crate::invocation::SearchArgs;

/// One deduplicated search hit as shown to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub engines: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutput {
    pub query: String,
    pub result_count: usize,
    pub results: Vec<SearchHit>,
}

pub struct SearchTool {
    client: reqwest::Client,
    config: SearchConfig,
}

impl SearchTool {
    pub fn new(config: SearchConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    /// Effective result cap for a request.
    fn result_cap(&self, requested: Option<i64>) -> usize {
        let hard = self.config.hard_max_results.max(1);
        match requested {
            Some(n) => n.clamp(1, hard as i64) as usize,
            None => self.config.default_max_results.clamp(1, hard),
        }
    }

    pub async fn search(&self, args: &SearchArgs) -> Result<SearchOutput, ToolError> {
        if args.query.is_empty() {
            return Err(ToolError::InvalidArguments("query is required".into()));
        }
        let cap = self.result_cap(args.max_results);

        let raw = self.fetch_with_retries(args).await.unwrap_or_default();
        let mut results = dedupe_by_url(raw);
        results.truncate(cap);

        Ok(SearchOutput {
            query: args.query.clone(),
            result_count: results.len(),
            results,
        })
    }

    async fn fetch_with_retries(&self, args: &SearchArgs) -> Option<Vec<SearchHit>> {
        let base = self.config.endpoint_base();
        if base.is_empty() {
            warn!("Search base URL is not configured; returning no results");
            return None;
        }
        let endpoint = format!("{base}/search");
        let attempts = self.config.max_retries + 1;
        let delay = Duration::from_secs(self.config.retry_delay_secs);

        for attempt in 1..=attempts {
            match self.request_once(&endpoint, args).await {
                Ok(hits) => {
                    debug!(query = %args.query, raw = hits.len(), attempt, "Search succeeded");
                    return Some(hits);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        query = %args.query,
                        attempt,
                        error = %e,
                        "Search request failed, retrying in {}s",
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(query = %args.query, attempts, error = %e, "Search failed after retries");
                }
            }
        }
        None
    }

    async fn request_once(
        &self,
        endpoint: &str,
        args: &SearchArgs,
    ) -> Result<Vec<SearchHit>, ToolError> {
        let language = args
            .language
            .clone()
            .unwrap_or_else(|| self.config.default_language.clone());
        let mut params: Vec<(&str, String)> = vec![
            ("q", args.query.clone()),
            ("format", "json".into()),
            ("language", language),
            ("pageno", args.pageno.max(1).to_string()),
        ];
        if !args.categories.is_empty() {
            params.push(("categories", args.categories.join(",")));
        }
        if let Some(range) = &args.time_range {
            params.push(("time_range", range.clone()));
        }

        let response = self
            .client
            .get(endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| ToolError::Network {
                url: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::HttpStatus {
                url: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = response.json().await.map_err(|e| ToolError::Network {
            url: endpoint.to_string(),
            reason: format!("invalid search response: {e}"),
        })?;
        Ok(parse_results(&body))
    }
}

fn str_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Pull hits out of a SearXNG JSON body, skipping entries without a URL.
pub fn parse_results(body: &Value) -> Vec<SearchHit> {
    let Some(items) = body.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let url = str_field(item, "url");
            if url.is_empty() {
                return None;
            }
            let engines = item
                .get("engines")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let published_date = item
                .get("publishedDate")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            Some(SearchHit {
                title: str_field(item, "title"),
                url,
                snippet: str_field(item, "content"),
                engines,
                published_date,
            })
        })
        .collect()
}

/// Collapse hits sharing a URL into the first one, merging engine lists.
pub fn dedupe_by_url(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<SearchHit> = Vec::with_capacity(hits.len());
    for hit in hits {
        match index.get(&hit.url) {
            Some(&i) => {
                let kept = &mut out[i];
                for engine in hit.engines {
                    if !kept.engines.contains(&engine) {
                        kept.engines.push(engine);
                    }
                }
                if kept.published_date.is_none() {
                    kept.published_date = hit.published_date;
                }
            }
            None => {
                index.insert(hit.url.clone(), out.len());
                out.push(hit);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(base_url: String) -> SearchConfig {
        SearchConfig {
            base_url,
            retry_delay_secs: 0,
            ..SearchConfig::default()
        }
    }

    fn args(query: &str) -> SearchArgs {
        SearchArgs {
            query: query.into(),
            pageno: 1,
            ..SearchArgs::default()
        }
    }

    fn hit(url: &str, engines: &[&str]) -> SearchHit {
        SearchHit {
            title: url.into(),
            url: url.into(),
            snippet: String::new(),
            engines: engines.iter().map(|e| e.to_string()).collect(),
            published_date: None,
        }
    }

    #[test]
    fn duplicate_urls_merge_engines() {
        let merged = dedupe_by_url(vec![
            hit("https://a.example", &["google", "bing"]),
            hit("https://b.example", &["ddg"]),
            hit("https://a.example", &["bing", "brave"]),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].url, "https://a.example");
        assert_eq!(merged[0].engines, vec!["google", "bing", "brave"]);
        assert_eq!(merged[1].engines, vec!["ddg"]);
    }

    #[test]
    fn parse_skips_entries_without_url() {
        let body = json!({"results": [
            {"title": "No url"},
            {"title": " T ", "url": "https://a.example", "content": "snip", "engines": ["google"], "publishedDate": "2024-01-02"},
            {"title": "Null date", "url": "https://b.example", "publishedDate": null}
        ]});
        let hits = parse_results(&body);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "T");
        assert_eq!(hits[0].snippet, "snip");
        assert_eq!(hits[0].published_date.as_deref(), Some("2024-01-02"));
        assert_eq!(hits[1].published_date, None);
    }

    #[test]
    fn published_date_is_omitted_when_absent() {
        let json = serde_json::to_value(hit("https://a.example", &[])).unwrap();
        assert!(json.get("published_date").is_none());
    }

    #[test]
    fn result_cap_is_clamped() {
        let tool = SearchTool::new(config(String::new())).unwrap();
        assert_eq!(tool.result_cap(None), 5);
        assert_eq!(tool.result_cap(Some(0)), 1);
        assert_eq!(tool.result_cap(Some(3)), 3);
        assert_eq!(tool.result_cap(Some(500)), 10);
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let tool = SearchTool::new(config("http://127.0.0.1:9".into())).unwrap();
        let err = tool.search(&args("")).await.unwrap_err();
        assert_eq!(err.to_string(), "query is required");
    }

    #[tokio::test]
    async fn searches_dedupes_and_caps() {
        async fn handler(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
            assert_eq!(q.get("format").map(String::as_str), Some("json"));
            assert_eq!(q.get("categories").map(String::as_str), Some("news,it"));
            let results: Vec<Value> = (0..12)
                .map(|i| {
                    json!({
                        "title": format!("Result {i}"),
                        "url": format!("https://site.example/{}", i % 8),
                        "content": "body",
                        "engines": [format!("engine{i}")]
                    })
                })
                .collect();
            Json(json!({ "query": q.get("q"), "results": results }))
        }
        let base = serve(Router::new().route("/search", get(handler))).await;
        let tool = SearchTool::new(config(format!("{base}/"))).unwrap();

        let mut request = args("rust");
        request.categories = vec!["news".into(), "it".into()];
        request.max_results = Some(50);
        let out = tool.search(&request).await.unwrap();

        assert_eq!(out.query, "rust");
        assert_eq!(out.result_count, 8);
        assert_eq!(out.results[0].engines, vec!["engine0", "engine8"]);
    }

    #[tokio::test]
    async fn exhausted_retries_yield_zero_results() {
        async fn failing(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
            hits.fetch_add(1, Ordering::SeqCst);
            StatusCode::BAD_GATEWAY
        }
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/search", get(failing))
            .with_state(hits.clone());
        let base = serve(app).await;
        let tool = SearchTool::new(config(base)).unwrap();

        let out = tool.search(&args("anything")).await.unwrap();
        assert_eq!(out.result_count, 0);
        assert!(out.results.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
