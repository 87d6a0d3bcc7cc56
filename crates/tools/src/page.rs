//! Retrieved pages: the full snapshot kept in the cache and the excerpt
//! returned to the model.

use serde::Serialize;

/// Everything learned about a URL, with the untruncated text.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    pub final_url: String,
    pub status_code: Option<u16>,
    /// Only plain fetches report a content type
    pub content_type: Option<String>,
    pub title: String,
    pub full_text: String,
    /// Only plain fetches cap the body
    pub bytes_truncated: Option<bool>,
    pub links: Vec<String>,
}

/// The tool result for `web_fetch` and `web_render`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageOutput {
    pub url: String,
    pub final_url: String,
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub title: String,
    pub text: String,
    /// Length of the full text in characters
    pub text_length: usize,
    pub text_truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_truncated: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

/// Keep at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}

impl PageSnapshot {
    /// Slice the stored text to `max_chars` for one particular request.
    pub fn excerpt(&self, max_chars: usize, include_links: bool) -> PageOutput {
        let (text, text_truncated) = truncate_chars(&self.full_text, max_chars);
        PageOutput {
            url: self.url.clone(),
            final_url: self.final_url.clone(),
            status_code: self.status_code,
            content_type: self.content_type.clone(),
            title: self.title.clone(),
            text,
            text_length: self.full_text.chars().count(),
            text_truncated,
            bytes_truncated: self.bytes_truncated,
            links: if include_links { self.links.clone() } else { Vec::new() },
        }
    }
}
