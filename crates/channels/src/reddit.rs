//! Reddit platform adapter.
//!
//! Authenticates as a script app with the OAuth password grant and talks to
//! `oauth.reddit.com`. The comment stream polls `/r/<subs>/comments`; the
//! first poll only records what already exists, so the stream starts with
//! comments posted after it was opened.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use summonbot_config::{ListenerConfig, RedditConfig};
use summonbot_core::{
    Comment, CommentStream, GalleryItem, Platform, PlatformError, Submission, Thread,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const API_BASE: &str = "https://oauth.reddit.com";

/// Ancestors fetched before the chain is cut off.
const MAX_PARENT_DEPTH: usize = 50;

/// Fullnames remembered by the stream for de-duplication.
const SEEN_CAPACITY: usize = 2_000;

/// Tokens are refreshed this long before they expire.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditEndpoints {
    pub token_url: String,
    pub api_base: String,
}

impl Default for RedditEndpoints {
    fn default() -> Self {
        Self {
            token_url: TOKEN_URL.into(),
            api_base: API_BASE.into(),
        }
    }
}

struct Credentials {
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// HTTP plumbing shared by the platform and its comment streams.
struct RedditApi {
    client: reqwest::Client,
    credentials: Credentials,
    endpoints: RedditEndpoints,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Deserialize)]
struct Thing {
    kind: String,
    data: Value,
}

#[derive(Deserialize)]
struct CommentData {
    id: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    subreddit: String,
    link_id: String,
    parent_id: String,
}

impl From<CommentData> for Comment {
    fn from(data: CommentData) -> Self {
        Comment {
            id: data.id,
            author: data.author.filter(|a| a != "[deleted]"),
            body: data.body,
            subreddit: data.subreddit,
            link_id: data.link_id,
            parent_id: data.parent_id,
        }
    }
}

#[derive(Deserialize)]
struct LinkData {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    post_hint: Option<String>,
    #[serde(default)]
    is_gallery: Option<bool>,
    #[serde(default)]
    media_metadata: Option<BTreeMap<String, MediaMetadata>>,
    #[serde(default)]
    gallery_data: Option<GalleryData>,
}

#[derive(Deserialize)]
struct MediaMetadata {
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    m: Option<String>,
    #[serde(default)]
    s: Option<MediaSource>,
}

#[derive(Deserialize)]
struct MediaSource {
    #[serde(default)]
    u: Option<String>,
    #[serde(default)]
    gif: Option<String>,
}

#[derive(Deserialize)]
struct GalleryData {
    #[serde(default)]
    items: Vec<GalleryEntry>,
}

#[derive(Deserialize)]
struct GalleryEntry {
    media_id: String,
}

fn gallery_item(meta: &MediaMetadata) -> GalleryItem {
    GalleryItem {
        media_type: meta.m.clone(),
        kind: meta.e.clone(),
        source_url: meta
            .s
            .as_ref()
            .and_then(|s| s.u.clone().or_else(|| s.gif.clone())),
    }
}

impl From<LinkData> for Submission {
    fn from(data: LinkData) -> Self {
        let metadata = data.media_metadata.unwrap_or_default();
        // Gallery order comes from gallery_data; metadata alone is unordered.
        let gallery = match &data.gallery_data {
            Some(order) => order
                .items
                .iter()
                .filter_map(|entry| metadata.get(&entry.media_id))
                .map(gallery_item)
                .collect(),
            None => metadata.values().map(gallery_item).collect(),
        };
        Submission {
            id: data.id,
            title: data.title,
            permalink: data.permalink,
            url: data.url,
            is_self: data.is_self,
            selftext: data.selftext,
            post_hint: data.post_hint,
            is_gallery: data.is_gallery.unwrap_or(false),
            gallery,
        }
    }
}

fn status_reason(status: StatusCode) -> String {
    format!("HTTP status {}", status.as_u16())
}

impl RedditApi {
    async fn token(&self) -> Result<String, PlatformError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        debug!("Requesting Reddit access token");
        let response = self
            .client
            .post(&self.endpoints.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PlatformError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Auth(status_reason(status)));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Auth(format!("invalid token response: {e}")))?;
        if let Some(error) = body.error {
            return Err(PlatformError::Auth(error));
        }
        let value = body
            .access_token
            .ok_or_else(|| PlatformError::Auth("token response has no access_token".into()))?;
        let lifetime = Duration::from_secs(body.expires_in.unwrap_or(3600));

        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_MARGIN),
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn send_once<F>(&self, build: &F) -> Result<Response, String>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.token().await.map_err(|e| e.to_string())?;
        build(&self.client)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| e.to_string())
    }

    /// Send an authorized request, renewing the token once on 401.
    async fn send<F>(&self, build: F) -> Result<Response, String>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self.send_once(&build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        warn!("Reddit rejected the access token, requesting a new one");
        self.invalidate_token().await;
        self.send_once(&build).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoints.api_base.trim_end_matches('/'), path)
    }

    async fn listing(&self, path: &str, query: &[(&str, &str)]) -> Result<Vec<Thing>, String> {
        let url = self.url(path);
        let response = self.send(|c| c.get(&url).query(query)).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_reason(status));
        }
        let listing: Listing = response.json().await.map_err(|e| e.to_string())?;
        Ok(listing.data.children)
    }

    /// Newest comments of `path`, newest first as the API returns them.
    async fn new_comments(&self, path: &str) -> Result<Vec<Comment>, String> {
        let things = self
            .listing(path, &[("limit", "100"), ("raw_json", "1")])
            .await?;
        Ok(things
            .into_iter()
            .filter(|t| t.kind == "t1")
            .filter_map(|t| serde_json::from_value::<CommentData>(t.data).ok())
            .map(Comment::from)
            .collect())
    }

    async fn info(&self, fullname: &str) -> Result<Thing, String> {
        self.listing("/api/info", &[("id", fullname), ("raw_json", "1")])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| "not found".to_string())
    }

    async fn comment(&self, fullname: &str) -> Result<Comment, PlatformError> {
        let lookup = |reason: String| PlatformError::Lookup {
            id: fullname.to_string(),
            reason,
        };
        let thing = self.info(fullname).await.map_err(lookup)?;
        if thing.kind != "t1" {
            return Err(lookup(format!("expected a comment, got {}", thing.kind)));
        }
        serde_json::from_value::<CommentData>(thing.data)
            .map(Comment::from)
            .map_err(|e| lookup(e.to_string()))
    }

    async fn submission(&self, fullname: &str) -> Result<Submission, PlatformError> {
        let lookup = |reason: String| PlatformError::Lookup {
            id: fullname.to_string(),
            reason,
        };
        let thing = self.info(fullname).await.map_err(lookup)?;
        if thing.kind != "t3" {
            return Err(lookup(format!("expected a submission, got {}", thing.kind)));
        }
        serde_json::from_value::<LinkData>(thing.data)
            .map(Submission::from)
            .map_err(|e| lookup(e.to_string()))
    }
}

/// Bounded record of fullnames already seen by a stream.
struct SeenSet {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl SeenSet {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `key`; `false` when it was already present.
    fn insert(&mut self, key: String) -> bool {
        if self.members.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.members.remove(&old);
            }
        }
        self.members.insert(key.clone());
        self.order.push_back(key);
        true
    }
}

struct Poller {
    api: Arc<RedditApi>,
    path: String,
    poll_interval: Duration,
    seen: SeenSet,
    pending: VecDeque<Comment>,
    primed: bool,
}

impl Poller {
    async fn advance(mut self) -> Option<(Result<Comment, PlatformError>, Self)> {
        loop {
            if let Some(comment) = self.pending.pop_front() {
                return Some((Ok(comment), self));
            }
            if self.primed {
                tokio::time::sleep(self.poll_interval).await;
            }
            let batch = match self.api.new_comments(&self.path).await {
                Ok(batch) => batch,
                Err(reason) => return Some((Err(PlatformError::Stream(reason)), self)),
            };
            let fresh: Vec<Comment> = batch
                .into_iter()
                .filter(|c| self.seen.insert(c.fullname()))
                .collect();
            if !self.primed {
                debug!(skipped = fresh.len(), "Comment stream primed");
                self.primed = true;
                continue;
            }
            self.pending.extend(fresh.into_iter().rev());
        }
    }
}

pub struct RedditPlatform {
    api: Arc<RedditApi>,
    username: String,
    subreddits: String,
    poll_interval: Duration,
}

impl RedditPlatform {
    /// Build from the `[reddit]` and `[listener]` sections.
    pub fn from_config(reddit: &RedditConfig, listener: &ListenerConfig) -> Result<Self, PlatformError> {
        Self::with_endpoints(reddit, listener, RedditEndpoints::default())
    }

    pub fn with_endpoints(
        reddit: &RedditConfig,
        listener: &ListenerConfig,
        endpoints: RedditEndpoints,
    ) -> Result<Self, PlatformError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| PlatformError::NotConfigured(format!("{name} is not set")))
        };
        let credentials = Credentials {
            client_id: required(&reddit.client_id, "REDDIT_CLIENT_ID")?,
            client_secret: required(&reddit.client_secret, "REDDIT_CLIENT_SECRET")?,
            username: required(&reddit.username, "REDDIT_USERNAME")?,
            password: required(&reddit.password, "REDDIT_PASSWORD")?,
        };
        let user_agent = required(&reddit.user_agent, "USER_AGENT")?;

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlatformError::NotConfigured(format!("HTTP client: {e}")))?;

        let subreddits = listener
            .subreddits
            .iter()
            .map(|s| s.trim().trim_start_matches("r/"))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("+");

        Ok(Self {
            username: credentials.username.clone(),
            api: Arc::new(RedditApi {
                client,
                credentials,
                endpoints,
                token: Mutex::new(None),
            }),
            subreddits,
            poll_interval: Duration::from_secs(listener.poll_interval_secs),
        })
    }
}

#[async_trait]
impl Platform for RedditPlatform {
    fn name(&self) -> &str {
        "reddit"
    }

    fn own_username(&self) -> Option<&str> {
        Some(&self.username)
    }

    async fn comments(&self) -> Result<CommentStream, PlatformError> {
        // Fail fast on bad credentials instead of on the first poll.
        self.api.token().await?;
        info!(subreddits = %self.subreddits, "Opening comment stream");
        let poller = Poller {
            api: self.api.clone(),
            path: format!("/r/{}/comments", self.subreddits),
            poll_interval: self.poll_interval,
            seen: SeenSet::new(SEEN_CAPACITY),
            pending: VecDeque::new(),
            primed: false,
        };
        Ok(Box::pin(futures::stream::unfold(poller, Poller::advance)))
    }

    async fn thread(&self, comment: &Comment) -> Result<Thread, PlatformError> {
        let mut chain = vec![comment.clone()];
        let mut parent = comment.parent_id.clone();
        while parent.starts_with("t1_") {
            if chain.len() > MAX_PARENT_DEPTH {
                warn!(comment_id = %comment.id, "Parent chain too deep, truncating");
                break;
            }
            let ancestor = self.api.comment(&parent).await?;
            parent = ancestor.parent_id.clone();
            chain.push(ancestor);
        }
        let submission = self.api.submission(&comment.link_id).await?;
        Ok(Thread {
            subreddit: comment.subreddit.clone(),
            submission,
            chain,
        })
    }

    async fn reply(&self, comment: &Comment, text: &str) -> Result<(), PlatformError> {
        let target = comment.fullname();
        let failed = |reason: String| PlatformError::Reply {
            target: target.clone(),
            reason,
        };
        let url = self.api.url("/api/comment");
        let response = self
            .api
            .send(|c| {
                c.post(&url).form(&[
                    ("thing_id", target.as_str()),
                    ("text", text),
                    ("api_type", "json"),
                ])
            })
            .await
            .map_err(failed)?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(status_reason(status)));
        }
        let body: Value = response.json().await.map_err(|e| failed(e.to_string()))?;
        let errors = body
            .pointer("/json/errors")
            .and_then(Value::as_array)
            .filter(|errors| !errors.is_empty());
        if let Some(errors) = errors {
            return Err(failed(Value::Array(errors.clone()).to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Form, Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use futures::StreamExt;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeReddit {
        token_requests: AtomicUsize,
        comment_polls: AtomicUsize,
        reject_next_api_call: AtomicUsize,
        replies: StdMutex<Vec<HashMap<String, String>>>,
        info_ids: StdMutex<Vec<String>>,
    }

    fn comment_thing(id: &str, parent: &str, body: &str) -> Value {
        json!({"kind": "t1", "data": {
            "id": id, "author": format!("user_{id}"), "body": body,
            "subreddit": "rust", "link_id": "t3_post", "parent_id": parent
        }})
    }

    fn listing(children: Vec<Value>) -> Value {
        json!({"kind": "Listing", "data": {"children": children}})
    }

    fn authorized(state: &FakeReddit, headers: &HeaderMap) -> bool {
        if state.reject_next_api_call.load(Ordering::SeqCst) > 0 {
            state.reject_next_api_call.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Bearer token-"))
    }

    async fn token(
        State(state): State<Arc<FakeReddit>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> Json<Value> {
        if form.get("password").map(String::as_str) != Some("hunter2") {
            return Json(json!({"error": "invalid_grant"}));
        }
        let n = state.token_requests.fetch_add(1, Ordering::SeqCst);
        Json(json!({"access_token": format!("token-{n}"), "token_type": "bearer", "expires_in": 3600}))
    }

    async fn comments(
        State(state): State<Arc<FakeReddit>>,
        headers: HeaderMap,
    ) -> (AxumStatus, Json<Value>) {
        if !authorized(&state, &headers) {
            return (AxumStatus::UNAUTHORIZED, Json(json!({})));
        }
        let poll = state.comment_polls.fetch_add(1, Ordering::SeqCst);
        let children = match poll {
            0 => vec![comment_thing("c2", "t3_post", "old"), comment_thing("c1", "t3_post", "older")],
            1 => vec![
                comment_thing("c4", "t3_post", "newest"),
                comment_thing("c3", "t3_post", "new"),
                comment_thing("c2", "t3_post", "old"),
            ],
            _ => vec![comment_thing("c4", "t3_post", "newest")],
        };
        (AxumStatus::OK, Json(listing(children)))
    }

    async fn info(
        State(state): State<Arc<FakeReddit>>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> (AxumStatus, Json<Value>) {
        if !authorized(&state, &headers) {
            return (AxumStatus::UNAUTHORIZED, Json(json!({})));
        }
        let id = query.get("id").cloned().unwrap_or_default();
        state.info_ids.lock().unwrap().push(id.clone());
        let child = match id.as_str() {
            "t1_mid" => comment_thing("mid", "t1_root", "middle"),
            "t1_root" => json!({"kind": "t1", "data": {
                "id": "root", "author": "[deleted]", "body": "[deleted]",
                "subreddit": "rust", "link_id": "t3_post", "parent_id": "t3_post"
            }}),
            "t3_post" => json!({"kind": "t3", "data": {
                "id": "post", "title": "Gallery", "permalink": "/r/rust/comments/post/gallery/",
                "url": "https://www.reddit.com/gallery/post", "is_self": false,
                "selftext": "", "is_gallery": true,
                "gallery_data": {"items": [{"media_id": "zz"}, {"media_id": "aa"}]},
                "media_metadata": {
                    "aa": {"e": "Image", "m": "image/png", "s": {"u": "https://preview.redd.it/aa.png?a=1&amp;b=2"}},
                    "zz": {"e": "AnimatedImage", "m": "image/gif", "s": {"gif": "https://i.redd.it/zz.gif"}}
                }
            }}),
            _ => return (AxumStatus::OK, Json(listing(vec![]))),
        };
        (AxumStatus::OK, Json(listing(vec![child])))
    }

    async fn reply(
        State(state): State<Arc<FakeReddit>>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> (AxumStatus, Json<Value>) {
        if !authorized(&state, &headers) {
            return (AxumStatus::UNAUTHORIZED, Json(json!({})));
        }
        let rejected = form.get("text").map(String::as_str) == Some("too fast");
        state.replies.lock().unwrap().push(form);
        if rejected {
            return (
                AxumStatus::OK,
                Json(json!({"json": {"errors": [["RATELIMIT", "you are doing that too much", "ratelimit"]]}})),
            );
        }
        (AxumStatus::OK, Json(json!({"json": {"errors": [], "data": {"things": []}}})))
    }

    async fn serve(state: Arc<FakeReddit>) -> String {
        let app = Router::new()
            .route("/api/v1/access_token", post(token))
            .route("/r/{subs}/comments", get(comments))
            .route("/api/info", get(info))
            .route("/api/comment", post(reply))
            .with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn reddit_config(password: &str) -> RedditConfig {
        RedditConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            username: Some("summonbot".into()),
            password: Some(password.into()),
            user_agent: Some("summonbot-tests/1.0".into()),
        }
    }

    fn listener_config() -> ListenerConfig {
        ListenerConfig {
            subreddits: vec!["rust".into(), "r/news".into()],
            poll_interval_secs: 0,
            ..ListenerConfig::default()
        }
    }

    async fn platform(state: Arc<FakeReddit>, password: &str) -> RedditPlatform {
        let base = serve(state).await;
        RedditPlatform::with_endpoints(
            &reddit_config(password),
            &listener_config(),
            RedditEndpoints {
                token_url: format!("{base}/api/v1/access_token"),
                api_base: base,
            },
        )
        .unwrap()
    }

    fn trigger_comment() -> Comment {
        Comment {
            id: "leaf".into(),
            author: Some("asker".into()),
            body: "u/grok what is this?".into(),
            subreddit: "rust".into(),
            link_id: "t3_post".into(),
            parent_id: "t1_mid".into(),
        }
    }

    #[test]
    fn missing_credentials_are_reported() {
        let mut config = reddit_config("pw");
        config.client_secret = None;
        let err = RedditPlatform::from_config(&config, &ListenerConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("REDDIT_CLIENT_SECRET"));
    }

    #[test]
    fn seen_set_is_bounded() {
        let mut seen = SeenSet::new(2);
        assert!(seen.insert("a".into()));
        assert!(!seen.insert("a".into()));
        assert!(seen.insert("b".into()));
        assert!(seen.insert("c".into()));
        // "a" was evicted
        assert!(seen.insert("a".into()));
    }

    #[tokio::test]
    async fn stream_skips_existing_and_yields_oldest_first() {
        let state = Arc::new(FakeReddit::default());
        let platform = platform(state.clone(), "hunter2").await;
        assert_eq!(platform.own_username(), Some("summonbot"));

        let mut stream = platform.comments().await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.id, "c3");
        assert_eq!(second.id, "c4");
        assert_eq!(first.author.as_deref(), Some("user_c3"));
        assert_eq!(state.token_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bad_credentials_fail_to_open_the_stream() {
        let state = Arc::new(FakeReddit::default());
        let platform = platform(state, "wrong").await;
        let err = platform.comments().await.err().unwrap();
        assert!(matches!(err, PlatformError::Auth(ref m) if m == "invalid_grant"));
    }

    #[tokio::test]
    async fn thread_walks_parents_and_reads_the_gallery() {
        let state = Arc::new(FakeReddit::default());
        let platform = platform(state.clone(), "hunter2").await;

        let thread = platform.thread(&trigger_comment()).await.unwrap();
        let ids: Vec<&str> = thread.chain.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["leaf", "mid", "root"]);
        assert_eq!(thread.chain[2].author, None);
        assert_eq!(thread.subreddit, "rust");

        let sub = &thread.submission;
        assert_eq!(sub.title, "Gallery");
        assert!(sub.is_gallery);
        let urls: Vec<_> = sub.gallery.iter().map(|g| g.source_url.clone().unwrap()).collect();
        assert_eq!(
            urls,
            vec!["https://i.redd.it/zz.gif", "https://preview.redd.it/aa.png?a=1&amp;b=2"]
        );
        assert_eq!(sub.gallery[1].kind.as_deref(), Some("Image"));
        assert_eq!(
            *state.info_ids.lock().unwrap(),
            vec!["t1_mid", "t1_root", "t3_post"]
        );
    }

    #[tokio::test]
    async fn missing_parent_is_a_lookup_error() {
        let state = Arc::new(FakeReddit::default());
        let platform = platform(state, "hunter2").await;
        let mut comment = trigger_comment();
        comment.parent_id = "t1_gone".into();
        let err = platform.thread(&comment).await.unwrap_err();
        assert!(matches!(err, PlatformError::Lookup { ref id, .. } if id == "t1_gone"));
    }

    #[tokio::test]
    async fn reply_posts_form_and_checks_api_errors() {
        let state = Arc::new(FakeReddit::default());
        let platform = platform(state.clone(), "hunter2").await;

        platform.reply(&trigger_comment(), "It's sunny.").await.unwrap();
        let err = platform.reply(&trigger_comment(), "too fast").await.unwrap_err();
        assert!(err.to_string().contains("RATELIMIT"));

        let replies = state.replies.lock().unwrap();
        assert_eq!(replies[0]["thing_id"], "t1_leaf");
        assert_eq!(replies[0]["text"], "It's sunny.");
        assert_eq!(replies[0]["api_type"], "json");
    }

    #[tokio::test]
    async fn expired_token_is_renewed_once() {
        let state = Arc::new(FakeReddit::default());
        let platform = platform(state.clone(), "hunter2").await;

        platform.reply(&trigger_comment(), "first").await.unwrap();
        state.reject_next_api_call.store(1, Ordering::SeqCst);
        platform.reply(&trigger_comment(), "second").await.unwrap();

        assert_eq!(state.token_requests.load(Ordering::SeqCst), 2);
        assert_eq!(state.replies.lock().unwrap().len(), 2);
    }
}
