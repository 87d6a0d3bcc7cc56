//! Turning response bodies into readable text.
//!
//! [`ContentExtractor`] runs a list of [`TextStrategy`] implementations in
//! order and keeps the first one that produces text:
//!
//! - [`MainContentStrategy`]: picks the densest article-like block, drops
//!   navigation chrome, keeps tables, prefers `og:title`
//! - [`TagStripStrategy`]: regex tag stripping over the whole document;
//!   always produces a result, so it goes last
//!
//! Also here: link extraction, content-type classification, JSON
//! pretty-printing.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Links returned per page.
pub const MAX_LINKS: usize = 25;

/// Bytes of body inspected when sniffing for HTML.
const SNIFF_BYTES: usize = 2000;

/// Title and readable text pulled from a page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extracted {
    pub title: String,
    pub text: String,
}

/// One way of getting readable text out of HTML.
pub trait TextStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the strategy found nothing worth returning.
    fn extract(&self, html: &str, url: &str) -> Option<Extracted>;
}

pub struct ContentExtractor {
    strategies: Vec<Box<dyn TextStrategy>>,
}

impl ContentExtractor {
    pub fn new(strategies: Vec<Box<dyn TextStrategy>>) -> Self {
        Self { strategies }
    }

    /// Extract title and text; falls back to the page `<title>` and empty
    /// text when every strategy comes up empty.
    pub fn extract(&self, html: &str, url: &str) -> Extracted {
        for strategy in &self.strategies {
            if let Some(found) = strategy.extract(html, url) {
                if !found.text.trim().is_empty() {
                    tracing::trace!(strategy = strategy.name(), url, "Extracted page text");
                    return found;
                }
            }
        }
        Extracted {
            title: page_title(html),
            text: String::new(),
        }
    }
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(vec![Box::new(MainContentStrategy), Box::new(TagStripStrategy)])
    }
}

// ── Title ──

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `<title>` element's decoded, whitespace-collapsed text.
pub fn page_title(html: &str) -> String {
    let doc = Html::parse_document(html);
    first_title(&doc)
}

fn first_title(doc: &Html) -> String {
    let Ok(sel) = Selector::parse("title") else {
        return String::new();
    };
    doc.select(&sel)
        .next()
        .map(|el| collapse_ws(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn meta_title(doc: &Html) -> Option<String> {
    let sel = Selector::parse(r#"meta[property="og:title"], meta[name="twitter:title"]"#).ok()?;
    doc.select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_ws)
        .find(|t| !t.is_empty())
}

// ── Main-content strategy ──

/// Subtrees that never contribute text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "img", "picture", "video",
    "audio", "canvas", "nav", "header", "footer", "aside", "form", "button", "select", "head",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5",
    "h6", "blockquote", "pre", "table", "tr", "dl", "dt", "dd", "figure", "figcaption", "br",
    "hr",
];

fn class_or_id_lc(el: &ElementRef) -> String {
    let mut out = String::new();
    if let Some(c) = el.value().attr("class") {
        out.push_str(c);
        out.push(' ');
    }
    if let Some(i) = el.value().attr("id") {
        out.push_str(i);
    }
    out.to_ascii_lowercase()
}

fn is_boilerplate_container(el: &ElementRef) -> bool {
    let s = class_or_id_lc(el);
    if s.is_empty() {
        return false;
    }
    [
        "navbar", "menu", "sidebar", "footer", "cookie", "consent", "advert", "promo",
        "subscribe", "newsletter", "share", "related",
    ]
    .iter()
    .any(|bad| s.contains(bad))
}

/// Render an element's visible text, keeping block structure as newlines
/// and table cells separated by ` | `.
fn render_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let tag = child_el.value().name();
                if SKIP_TAGS.contains(&tag) || is_boilerplate_container(&child_el) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&tag);
                if block {
                    out.push('\n');
                }
                render_text(child_el, out);
                match tag {
                    "td" | "th" => out.push_str(" | "),
                    _ if block => out.push('\n'),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}

fn visible_text(el: ElementRef) -> String {
    let mut raw = String::new();
    render_text(el, &mut raw);
    normalize_whitespace(&raw)
}

fn link_text_chars(el: &ElementRef) -> usize {
    let Ok(sel) = Selector::parse("a") else {
        return 0;
    };
    el.select(&sel)
        .map(|a| a.text().map(|t| t.chars().count()).sum::<usize>())
        .sum()
}

/// Boilerplate-aware extraction: scores candidate containers by visible text
/// minus link text and renders the best one.
pub struct MainContentStrategy;

impl TextStrategy for MainContentStrategy {
    fn name(&self) -> &'static str {
        "main-content"
    }

    fn extract(&self, html: &str, _url: &str) -> Option<Extracted> {
        let doc = Html::parse_document(html);
        let sel = Selector::parse("article, main, section, div, td, body").ok()?;

        let mut best: Option<(i64, String)> = None;
        for el in doc.select(&sel).take(20_000) {
            if is_boilerplate_container(&el) {
                continue;
            }
            let text = visible_text(el);
            let chars = text.chars().count();
            if chars < 20 {
                continue;
            }
            let links = link_text_chars(&el);
            let mut score = chars as i64 - 2 * links as i64;
            match el.value().name() {
                "article" => score += 500,
                "main" => score += 300,
                "body" => score -= 200,
                _ => {}
            }
            if links > chars / 2 {
                score -= 500;
            }
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                best = Some((score, text));
            }
        }

        let (_, text) = best?;
        let title = meta_title(&doc).unwrap_or_else(|| first_title(&doc));
        Some(Extracted { title, text })
    }
}

// ── Tag-strip strategy ──

static SCRIPT_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>")
        .expect("hardcoded regex")
});
static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("hardcoded regex"));
static BLOCK_CLOSERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(?:p|div|li|h[1-6]|tr|section|article|ul|ol|table|blockquote)\s*>")
        .expect("hardcoded regex")
});
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("hardcoded regex"));
static INLINE_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\r\f\v]+").expect("hardcoded regex"));
static LEADING_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]+").expect("hardcoded regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("hardcoded regex"));

/// Decode HTML character references by letting html5ever parse the text.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    Html::parse_fragment(s).root_element().text().collect()
}

fn normalize_whitespace(s: &str) -> String {
    let s = INLINE_WS.replace_all(s, " ");
    let s = LEADING_WS.replace_all(&s, "\n");
    let s = BLANK_RUNS.replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// Naive but dependable: strip every tag, keep block boundaries.
pub fn html_to_text(html: &str) -> String {
    let s = SCRIPT_BLOCKS.replace_all(html, " ");
    let s = LINE_BREAKS.replace_all(&s, "\n");
    let s = BLOCK_CLOSERS.replace_all(&s, "\n");
    let s = ANY_TAG.replace_all(&s, " ");
    normalize_whitespace(&decode_entities(&s))
}

pub struct TagStripStrategy;

impl TextStrategy for TagStripStrategy {
    fn name(&self) -> &'static str {
        "tag-strip"
    }

    fn extract(&self, html: &str, _url: &str) -> Option<Extracted> {
        Some(Extracted {
            title: page_title(html),
            text: html_to_text(html),
        })
    }
}

// ── Links ──

/// Absolute http(s) links from anchor tags, deduplicated in document order.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let base = url::Url::parse(base_url).ok();
    let doc = Html::parse_document(html);
    let Ok(sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for el in doc.select(&sel) {
        if out.len() >= MAX_LINKS {
            break;
        }
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };
        let href_lc = href.to_ascii_lowercase();
        if href.is_empty()
            || href.starts_with('#')
            || href_lc.starts_with("javascript:")
            || href_lc.starts_with("mailto:")
            || href_lc.starts_with("tel:")
        {
            continue;
        }

        let resolved = match &base {
            Some(b) => b.join(href),
            None => url::Url::parse(href),
        };
        let Ok(abs) = resolved else {
            continue;
        };
        if !matches!(abs.scheme(), "http" | "https") {
            continue;
        }
        let abs = abs.to_string();
        if seen.insert(abs.clone()) {
            out.push(abs);
        }
    }
    out
}

// ── Content types ──

/// What a response body is, judged from its header and first bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentClass {
    pub is_html: bool,
    pub is_textual: bool,
}

impl ContentClass {
    pub fn detect(content_type: &str, body: &[u8]) -> Self {
        let ct = content_type.to_ascii_lowercase();
        let head = &body[..body.len().min(SNIFF_BYTES)];
        let sniffed = String::from_utf8_lossy(head).to_lowercase().contains("<html");
        let is_html = ct.contains("html") || sniffed;
        let is_textual = is_html
            || ct.starts_with("text/")
            || ["json", "xml", "javascript"].iter().any(|k| ct.contains(k));
        Self { is_html, is_textual }
    }
}

/// Pretty-print (2-space indent) when the content type says JSON and the
/// body parses.
pub fn pretty_json(content_type: &str, body: &str) -> Option<String> {
    if !content_type.to_ascii_lowercase().contains("json") {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    serde_json::to_string_pretty(&value).ok()
}
