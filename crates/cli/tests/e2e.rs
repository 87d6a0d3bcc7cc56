//! End-to-end tests for summonbot.
//!
//! These run the real tool dispatcher, agent loop and listener together.
//! Only the model, the discussion platform and the web are faked: the model
//! is scripted, the platform is an in-memory stream, and the web is a local
//! axum server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use summonbot_agent::{
    AgentLoop, AgentSettings, LoopExit, PromptTemplates, ThreadAnswerer, ThreadResponder,
    TranscriptBuilder,
};
use summonbot_channels::{CommentListener, ListenerExit, ListenerSettings};
use summonbot_config::{AppConfig, ListenerConfig};
use summonbot_core::error::{PlatformError, ProviderError};
use summonbot_core::message::{Message, MessageToolCall, Role};
use summonbot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use summonbot_core::{Comment, CommentStream, Platform, Submission, Thread, Trigger};
use summonbot_tools::ToolDispatcher;
use tokio::sync::watch;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: None,
        model: "mock".into(),
        finish_reason: Some("stop".into()),
        reasoning: None,
    }
}

fn tool_response(name: &str, args: Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall {
        id: format!("call_{name}"),
        name: name.into(),
        arguments: args.to_string(),
    }];
    ProviderResponse {
        message,
        usage: None,
        model: "mock".into(),
        finish_reason: Some("tool_calls".into()),
        reasoning: Some("looking it up".into()),
    }
}

/// A tool call whose argument string is not JSON.
fn malformed_tool_response(name: &str) -> ProviderResponse {
    let mut response = tool_response(name, json!({}));
    response.message.tool_calls[0].arguments = "{not json".into();
    response
}

fn tool_messages(request: &ProviderRequest) -> Vec<Value> {
    request
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| serde_json::from_str(&m.content).unwrap())
        .collect()
}

// ── Local web ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Web {
    searches: AtomicUsize,
    page_hits: AtomicUsize,
}

async fn searx(
    State(web): State<Arc<Web>>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Json<Value> {
    web.searches.fetch_add(1, Ordering::SeqCst);
    let q = params.get("q").cloned().unwrap_or_default();
    Json(json!({
        "query": q,
        "results": [{
            "title": "Forecast",
            "url": "https://weather.example/today",
            "content": "Sunny, 24C",
            "engines": ["duckduckgo"]
        }]
    }))
}

async fn article(State(web): State<Arc<Web>>) -> Html<&'static str> {
    web.page_hits.fetch_add(1, Ordering::SeqCst);
    Html(
        "<html><head><title>Release notes</title><script>var secret = 'tracking';</script></head>\
         <body><main><h1>Release notes</h1><p>Version 2 ships faster builds.</p>\
         <a href=\"/changelog\">Changelog</a></main></body></html>",
    )
}

async fn serve_web(web: Arc<Web>) -> String {
    let app = Router::new()
        .route("/search", get(searx))
        .route("/article", get(article))
        .with_state(web);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn app_config(search_base: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.search.base_url = search_base.into();
    config.search.max_retries = 0;
    config.render.enabled = false;
    config
}

fn answerer(provider: Arc<ScriptedProvider>, config: &AppConfig) -> ThreadAnswerer {
    let tools = Arc::new(ToolDispatcher::from_config(config).unwrap());
    let agent = AgentLoop::new(provider, tools, AgentSettings::from_config(&config.provider));
    ThreadAnswerer::new(
        Trigger::new(&config.listener.trigger_names).unwrap(),
        TranscriptBuilder::new(&config.transcript),
        PromptTemplates::default(),
        agent,
    )
}

fn comment(id: &str, body: &str) -> Comment {
    Comment {
        id: id.into(),
        author: Some("curious_user".into()),
        body: body.into(),
        subreddit: "weather".into(),
        link_id: "t3_post".into(),
        parent_id: "t3_post".into(),
    }
}

fn thread_for(trigger: Comment) -> Thread {
    Thread {
        subreddit: "weather".into(),
        submission: Submission {
            id: "post".into(),
            title: "Weekend plans?".into(),
            permalink: "/r/weather/comments/post/weekend_plans/".into(),
            is_self: true,
            selftext: "Thinking about a picnic.".into(),
            ..Submission::default()
        },
        chain: vec![trigger],
    }
}

// ── Mock Platform ────────────────────────────────────────────────────────

/// One batch of comments, then a stream that stays open and silent.
struct InMemoryPlatform {
    batch: Mutex<Option<Vec<Comment>>>,
    replies: Mutex<Vec<(String, String)>>,
}

impl InMemoryPlatform {
    fn new(batch: Vec<Comment>) -> Arc<Self> {
        Arc::new(Self {
            batch: Mutex::new(Some(batch)),
            replies: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl Platform for InMemoryPlatform {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn comments(&self) -> Result<CommentStream, PlatformError> {
        match self.batch.lock().unwrap().take() {
            Some(batch) => {
                let items = futures::stream::iter(batch.into_iter().map(Ok::<Comment, PlatformError>));
                Ok(Box::pin(futures::StreamExt::chain(items, futures::stream::pending())))
            }
            None => Ok(Box::pin(futures::stream::pending())),
        }
    }

    async fn thread(&self, comment: &Comment) -> Result<Thread, PlatformError> {
        Ok(thread_for(comment.clone()))
    }

    async fn reply(&self, comment: &Comment, text: &str) -> Result<(), PlatformError> {
        self.replies
            .lock()
            .unwrap()
            .push((comment.id.clone(), text.to_string()));
        Ok(())
    }
}

// ── E2E: listener to reply ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn e2e_summon_gets_the_model_answer_as_reply() {
    let provider = ScriptedProvider::new(vec![text_response("It's sunny.")]);
    let config = app_config("");
    let platform = InMemoryPlatform::new(vec![
        comment("c1", "nice day"),
        comment("c2", "u/grok What is the weather?"),
    ]);
    let responder = Arc::new(ThreadResponder::new(
        platform.clone(),
        answerer(provider.clone(), &config),
    ));
    let listener = Arc::new(CommentListener::new(
        platform.clone(),
        responder,
        Trigger::new(&config.listener.trigger_names).unwrap(),
        ListenerSettings::from_config(&ListenerConfig::default()),
    ));
    let stats = listener.stats();

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn({
        let listener = listener.clone();
        async move { listener.run(rx).await }
    });
    tokio::time::sleep(Duration::from_secs(30)).await;
    tx.send(true).unwrap();
    let exit = task.await.unwrap();

    assert_eq!(exit, ListenerExit::Shutdown);
    assert_eq!(exit.exit_code(), 0);
    assert_eq!(
        *platform.replies.lock().unwrap(),
        vec![("c2".to_string(), "It's sunny.".to_string())]
    );
    assert_eq!(provider.calls(), 1);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.comments_read, 2);
    assert_eq!(snapshot.comments_written, 1);

    let request = provider.request(0);
    assert_eq!(request.messages[0].role, Role::System);
    let user = &request.messages[1].content;
    assert!(user.contains("SUBREDDIT: r/weather"));
    assert!(user.contains("curious_user wrote:\n> u/grok What is the weather?"));
    assert!(user.ends_with("USER QUESTION (last comment): What is the weather?"));
    assert_eq!(request.tools.len(), 3);
    assert_eq!(request.parallel_tool_calls, Some(false));
}

// ── E2E: tool round trips ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_search_then_answer() {
    let web = Arc::new(Web::default());
    let base = serve_web(web.clone()).await;
    let provider = ScriptedProvider::new(vec![
        tool_response("web_search", json!({"query": "test"})),
        text_response("Final answer"),
    ]);

    let outcome = answerer(provider.clone(), &app_config(&base))
        .answer(&thread_for(comment("c1", "u/ai is it sunny?")))
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Final answer");
    assert_eq!(outcome.exit, LoopExit::Answered);
    assert_eq!(provider.calls(), 2);
    assert_eq!(web.searches.load(Ordering::SeqCst), 1);

    let results = tool_messages(&provider.request(1));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["result_count"], 1);
    assert_eq!(results[0]["query"], "test");
    assert_eq!(results[0]["results"][0]["url"], "https://weather.example/today");
}

#[tokio::test]
async fn e2e_tool_every_step_falls_back_to_best_effort() {
    let web = Arc::new(Web::default());
    let base = serve_web(web.clone()).await;
    let config = app_config(&base);
    let steps = config.provider.max_tool_steps;
    assert_eq!(steps, 16);

    let mut script: Vec<ProviderResponse> = (0..steps)
        .map(|i| tool_response("web_search", json!({"query": format!("attempt {i}")})))
        .collect();
    script.push(text_response("Best-effort answer"));
    let provider = ScriptedProvider::new(script);

    let outcome = answerer(provider.clone(), &config)
        .answer(&thread_for(comment("c1", "u/gpt dig deep")))
        .await
        .unwrap();

    assert_eq!(outcome.answer, "Best-effort answer");
    assert_eq!(outcome.exit, LoopExit::Fallback);
    assert_eq!(provider.calls(), steps + 1);

    let last = provider.request(steps);
    assert!(last.tools.is_empty());
    assert_eq!(last.messages.last().unwrap().role, Role::System);
}

#[tokio::test]
async fn e2e_fetch_strips_scripts_and_reuses_the_cache() {
    let web = Arc::new(Web::default());
    let base = serve_web(web.clone()).await;
    let url = format!("{base}/article");
    let provider = ScriptedProvider::new(vec![
        tool_response("web_fetch", json!({"url": url, "max_chars": 500})),
        tool_response("web_fetch", json!({"url": url, "include_links": false})),
        text_response("Version 2 ships faster builds."),
    ]);

    let outcome = answerer(provider.clone(), &app_config(&base))
        .answer(&thread_for(comment("c1", "u/grok what changed?")))
        .await
        .unwrap();
    assert_eq!(outcome.answer, "Version 2 ships faster builds.");
    assert_eq!(outcome.tool_calls, 2);

    // The second fetch was served from the cache.
    assert_eq!(web.page_hits.load(Ordering::SeqCst), 1);

    let results = tool_messages(&provider.request(2));
    assert_eq!(results.len(), 2);
    let first = &results[0];
    let text = first["text"].as_str().unwrap();
    assert!(text.contains("faster builds"));
    assert!(!text.contains("tracking"));
    assert_eq!(first["title"], "Release notes");
    assert_eq!(first["text_truncated"], false);
    assert!(first["links"].as_array().is_some_and(|l| !l.is_empty()));
    assert!(results[1].get("links").is_none_or(|l| l.as_array().is_some_and(|a| a.is_empty())));
}

#[tokio::test]
async fn e2e_tool_failures_reach_the_model_as_data() {
    let provider = ScriptedProvider::new(vec![
        tool_response("web_fetch", json!({"url": "ftp://example.com"})),
        tool_response("web_render", json!({"url": "https://example.com"})),
        tool_response("launch_rockets", json!({})),
        malformed_tool_response("web_search"),
        text_response("I could not look that up."),
    ]);

    let outcome = answerer(provider.clone(), &app_config(""))
        .answer(&thread_for(comment("c1", "@ai check this")))
        .await
        .unwrap();
    assert_eq!(outcome.answer, "I could not look that up.");
    assert_eq!(provider.calls(), 5);

    let results = tool_messages(&provider.request(4));
    assert_eq!(results[0]["error"], "url must start with http:// or https://");
    assert!(
        results[1]["error"]
            .as_str()
            .unwrap()
            .contains("disabled in configuration")
    );
    assert_eq!(results[1]["url"], "https://example.com");
    assert_eq!(results[2]["error"], "Unknown tool: launch_rockets");
    assert_eq!(results[3]["error"], "query is required");
}
