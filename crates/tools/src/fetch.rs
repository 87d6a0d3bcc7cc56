//! Plain HTTP page retrieval.

use std::sync::Arc;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use summonbot_config::FetchConfig;
use summonbot_core::ToolError;
use tracing::debug;

use crate::cache::{CacheKey, CacheKind, RetrievalCache};
use crate::extract::{ContentClass, ContentExtractor, extract_links, pretty_json};
use crate::invocation::{FetchArgs, validate_url};
use crate::page::{PageOutput, PageSnapshot};

/// Clamp a requested excerpt size into `[min_max_chars, default_max_chars]`.
pub fn clamp_max_chars(requested: Option<i64>, config: &FetchConfig) -> usize {
    let upper = config.default_max_chars.max(config.min_max_chars);
    match requested {
        Some(n) => n.clamp(config.min_max_chars as i64, upper as i64) as usize,
        None => upper,
    }
}

pub struct FetchTool {
    client: reqwest::Client,
    config: FetchConfig,
    cache: Arc<RetrievalCache>,
    extractor: Arc<ContentExtractor>,
}

impl FetchTool {
    pub fn new(
        config: FetchConfig,
        cache: Arc<RetrievalCache>,
        extractor: Arc<ContentExtractor>,
    ) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_fetch".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            config,
            cache,
            extractor,
        })
    }

    pub async fn fetch(&self, args: &FetchArgs) -> Result<PageOutput, ToolError> {
        validate_url(&args.url)?;
        let max_chars = clamp_max_chars(args.max_chars, &self.config);

        let key = CacheKey::new(CacheKind::Fetch, &args.url);
        if let Some(page) = self.cache.get(&key) {
            debug!(url = %args.url, "Fetch cache hit");
            return Ok(page.excerpt(max_chars, args.include_links));
        }

        let page = self.retrieve(&args.url).await?;
        self.cache.insert(key, page.clone());
        Ok(page.excerpt(max_chars, args.include_links))
    }

    async fn retrieve(&self, url: &str) -> Result<PageSnapshot, ToolError> {
        let network = |e: reqwest::Error| ToolError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let (body, bytes_truncated) = read_capped(response, self.config.max_bytes)
            .await
            .map_err(network)?;
        let class = ContentClass::detect(&content_type, &body);

        let (title, full_text, links) = if class.is_textual {
            let text = decode_body(&body, &content_type);
            if let Some(json) = pretty_json(&content_type, &text) {
                (String::new(), json, Vec::new())
            } else if class.is_html {
                let extracted = self.extractor.extract(&text, &final_url);
                let links = extract_links(&text, &final_url);
                (extracted.title, extracted.text, links)
            } else {
                (String::new(), text.trim().to_string(), Vec::new())
            }
        } else {
            (String::new(), String::new(), Vec::new())
        };

        debug!(
            url,
            status = status.as_u16(),
            bytes = body.len(),
            bytes_truncated,
            "Fetched page"
        );

        Ok(PageSnapshot {
            url: url.to_string(),
            final_url,
            status_code: Some(status.as_u16()),
            content_type: Some(content_type),
            title,
            full_text,
            bytes_truncated: Some(bytes_truncated),
            links,
        })
    }
}

/// Read at most `max_bytes` of the body; anything past the cap is dropped.
async fn read_capped(
    response: reqwest::Response,
    max_bytes: usize,
) -> Result<(Vec<u8>, bool), reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = max_bytes - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decode with the declared charset; unknown or missing labels mean UTF-8.
fn decode_body(bytes: &[u8], content_type: &str) -> String {
    let encoding = charset_label(content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}
