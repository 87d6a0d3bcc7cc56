//! Thread transcripts.
//!
//! Renders a [`Thread`] into the text block the model reads, root post
//! first and the summoning comment last, and gathers the image URLs found
//! along the way. Pure: no I/O happens here.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use summonbot_config::TranscriptConfig;
use summonbot_core::{Submission, Thread};

static DIRECT_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\S+\.(?:png|jpg|jpeg|gif|webp|bmp)").expect("hardcoded regex")
});
static DIRECT_IMAGE_FULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https?://\S+\.(?:png|jpg|jpeg|gif|webp|bmp)$").expect("hardcoded regex")
});
static MARKDOWN_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)!\[.*?\]\((https?://\S+\.(?:png|jpg|jpeg|gif|webp|bmp))\)")
        .expect("hardcoded regex")
});

/// The rendered thread and the images to attach with it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transcript {
    pub text: String,
    pub images: Vec<String>,
}

/// Whether the whole URL points straight at an image file.
pub fn is_direct_image(url: &str) -> bool {
    DIRECT_IMAGE_FULL.is_match(url)
}

/// Direct image links, then Markdown image targets, without repeats.
pub fn extract_image_urls(text: &str) -> Vec<String> {
    let direct = DIRECT_IMAGE.find_iter(text).map(|m| m.as_str());
    let markdown = MARKDOWN_IMAGE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str());
    dedupe(direct.chain(markdown).map(str::to_string))
}

fn dedupe(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

/// Prefix every non-blank line.
fn quote(body: &str, indent: &str) -> String {
    body.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect()
}

/// The last `max_chars` characters of `text`.
fn keep_tail(text: String, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    text.chars().skip(total - max_chars).collect()
}

fn is_reddit_media(url: &str) -> bool {
    url.contains("v.redd.it") || url.contains("i.redd.it")
}

fn gallery_images(submission: &Submission) -> impl Iterator<Item = String> + '_ {
    submission
        .gallery
        .iter()
        .filter(move |_| submission.is_gallery)
        .filter(|item| {
            item.media_type.as_deref().is_some_and(|m| m.contains("image"))
                || item.kind.as_deref() == Some("Image")
        })
        .filter_map(|item| item.source_url.as_deref())
        .filter(|u| !u.is_empty())
        .map(|u| u.replace("&amp;", "&"))
}

#[derive(Debug, Clone)]
pub struct TranscriptBuilder {
    max_chars: usize,
    max_images: usize,
    indent: String,
}

impl TranscriptBuilder {
    pub fn new(config: &TranscriptConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            max_images: config.max_images,
            indent: config.indent.clone(),
        }
    }

    pub fn build(&self, thread: &Thread) -> Transcript {
        let sub = &thread.submission;
        let mut parts = vec![
            format!("SUBREDDIT: r/{}", thread.subreddit),
            format!("SUBMISSION URL: https://www.reddit.com{}", sub.permalink),
        ];
        let link = sub.url.as_deref().filter(|u| !u.is_empty());
        if let Some(url) = link.filter(|_| !sub.is_self) {
            if !is_direct_image(url) && !is_reddit_media(url) {
                parts.push(format!("EXTERNAL LINK URL: {url}"));
            }
        }
        parts.push(format!("SUBMISSION TITLE: {}", sub.title.trim()));

        let mut images = Vec::new();
        if let Some(url) = link {
            if is_direct_image(url) || sub.post_hint.as_deref() == Some("image") {
                images.push(url.to_string());
            }
        }

        let selftext = sub.selftext.trim();
        if sub.is_self && !selftext.is_empty() {
            parts.push(selftext.to_string());
            images.extend(extract_image_urls(selftext));
        }
        images.extend(gallery_images(sub));

        parts.push("\n---".to_string());

        for comment in thread.chain.iter().rev() {
            let author = comment.author.as_deref().unwrap_or("[deleted]");
            let body = match comment.body.trim() {
                "" => "[empty]",
                body => body,
            };
            images.extend(extract_image_urls(body));
            parts.push(format!("{author} wrote:\n{}\n", quote(body, &self.indent)));
        }

        let mut images = dedupe(images);
        images.truncate(self.max_images);

        Transcript {
            text: keep_tail(parts.join("\n"), self.max_chars),
            images,
        }
    }
}
