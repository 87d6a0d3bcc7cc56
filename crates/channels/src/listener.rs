//! The comment listener.
//!
//! Consumes the platform's comment stream one item at a time, answers
//! comments that start with a summon, and posts the replies. A broken
//! stream is reopened after a growing delay; after too many consecutive
//! failures the listener gives up with [`ListenerExit::StreamRetriesExhausted`].
//! Any stream that delivers a comment resets the failure count, and a
//! stream that closes without delivering anything is reopened after the
//! first backoff step.
//!
//! Shutdown is a `watch<bool>` flipped to `true`. It is checked between
//! items and raced against every wait, but in-flight network calls are
//! left to finish or time out.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use summonbot_config::ListenerConfig;
use summonbot_core::{Comment, Platform, PlatformError, Responder, Trigger};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub comments_read: u64,
    pub comments_written: u64,
}

/// Counters shared between the stream loop and the stats logger.
#[derive(Debug, Default)]
pub struct ListenerStats {
    counts: Mutex<StatsSnapshot>,
}

impl ListenerStats {
    pub fn record_read(&self) {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .comments_read += 1;
    }

    pub fn record_written(&self) {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .comments_written += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub courtesy_delay: Duration,
    pub stats_interval: Duration,
    /// Total reply attempts, first one included
    pub reply_retries: u32,
    pub stream_backoff: Vec<Duration>,
    pub max_stream_retries: u32,
}

impl ListenerSettings {
    pub fn from_config(config: &ListenerConfig) -> Self {
        Self {
            courtesy_delay: Duration::from_secs(config.courtesy_delay_secs),
            stats_interval: Duration::from_secs(config.stats_interval_secs),
            reply_retries: config.reply_retries.max(1),
            stream_backoff: config
                .stream_backoff_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            max_stream_retries: config.max_stream_retries,
        }
    }

    /// Delay before reconnecting after `failures` earlier consecutive failures.
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let last = self.stream_backoff.len().saturating_sub(1);
        self.stream_backoff
            .get((failures as usize).min(last))
            .copied()
            .unwrap_or(Duration::from_secs(10))
    }
}

/// Wait between reply attempts: 2s, 4s, 8s, ...
pub fn reply_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt + 1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Shutdown,
    StreamRetriesExhausted,
}

impl ListenerExit {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Shutdown => 0,
            Self::StreamRetriesExhausted => 1,
        }
    }
}

enum StreamEnd {
    Closed,
    Shutdown,
    Failed(PlatformError),
}

/// How one opened stream ended, and how many items it delivered first.
struct Session {
    end: StreamEnd,
    items: u64,
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Resolves once shutdown is requested. A dropped sender never resolves.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Sleep for `duration`; `true` when shutdown cut the sleep short.
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = wait_for_shutdown(shutdown) => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

async fn log_stats(
    stats: Arc<ListenerStats>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let s = stats.snapshot();
        info!(
            "Comments read: {}, Comments written: {}",
            s.comments_read, s.comments_written
        );
        if sleep_or_shutdown(interval, &mut shutdown).await {
            break;
        }
    }
}

pub struct CommentListener {
    platform: Arc<dyn Platform>,
    responder: Arc<dyn Responder>,
    trigger: Trigger,
    settings: ListenerSettings,
    stats: Arc<ListenerStats>,
}

impl CommentListener {
    pub fn new(
        platform: Arc<dyn Platform>,
        responder: Arc<dyn Responder>,
        trigger: Trigger,
        settings: ListenerSettings,
    ) -> Self {
        Self {
            platform,
            responder,
            trigger,
            settings,
            stats: Arc::new(ListenerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ListenerStats> {
        self.stats.clone()
    }

    /// Listen until shutdown or until the stream cannot be kept open.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ListenerExit {
        info!(platform = self.platform.name(), "Comment listener started");
        let stats_task = tokio::spawn(log_stats(
            self.stats.clone(),
            self.settings.stats_interval,
            shutdown.clone(),
        ));

        let mut failures: u32 = 0;
        let exit = loop {
            if shutdown_requested(&shutdown) {
                break ListenerExit::Shutdown;
            }
            let session = self.consume(&mut shutdown).await;
            if session.items > 0 {
                failures = 0;
            }
            match session.end {
                StreamEnd::Shutdown => break ListenerExit::Shutdown,
                StreamEnd::Closed if session.items > 0 => {
                    debug!("Comment stream ended, reopening");
                }
                StreamEnd::Closed => {
                    let pause = self.settings.backoff_for(0);
                    debug!("Comment stream closed empty, reopening in {}s", pause.as_secs());
                    if sleep_or_shutdown(pause, &mut shutdown).await {
                        break ListenerExit::Shutdown;
                    }
                }
                StreamEnd::Failed(e) => {
                    if shutdown_requested(&shutdown) {
                        break ListenerExit::Shutdown;
                    }
                    let backoff = self.settings.backoff_for(failures);
                    error!(
                        "Comment stream error (attempt {}): {} - retrying in {}s",
                        failures + 1,
                        e,
                        backoff.as_secs()
                    );
                    failures += 1;
                    if failures > self.settings.max_stream_retries {
                        error!(
                            "Exceeded max stream retries ({}). Exiting.",
                            self.settings.max_stream_retries
                        );
                        break ListenerExit::StreamRetriesExhausted;
                    }
                    if sleep_or_shutdown(backoff, &mut shutdown).await {
                        break ListenerExit::Shutdown;
                    }
                }
            }
        };

        stats_task.abort();
        let s = self.stats.snapshot();
        info!(
            comments_read = s.comments_read,
            comments_written = s.comments_written,
            ?exit,
            "Comment listener stopped"
        );
        exit
    }

    async fn consume(&self, shutdown: &mut watch::Receiver<bool>) -> Session {
        let mut items = 0;
        let mut stream = match self.platform.comments().await {
            Ok(stream) => stream,
            Err(e) => return Session { end: StreamEnd::Failed(e), items },
        };
        loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => {
                    return Session { end: StreamEnd::Shutdown, items };
                }
                item = stream.next() => item,
            };
            let comment = match next {
                None => return Session { end: StreamEnd::Closed, items },
                Some(Err(e)) => return Session { end: StreamEnd::Failed(e), items },
                Some(Ok(comment)) => comment,
            };
            items += 1;
            if self.handle(&comment, shutdown).await {
                return Session { end: StreamEnd::Shutdown, items };
            }
        }
    }

    fn is_own(&self, comment: &Comment) -> bool {
        match (self.platform.own_username(), comment.author.as_deref()) {
            (Some(me), Some(author)) => me.eq_ignore_ascii_case(author),
            _ => false,
        }
    }

    /// Handle one comment; `true` when shutdown arrived meanwhile.
    async fn handle(&self, comment: &Comment, shutdown: &mut watch::Receiver<bool>) -> bool {
        self.stats.record_read();

        if self.is_own(comment) || !self.trigger.matches(&comment.body) {
            return false;
        }

        info!("Trigger detected in r/{} | {}", comment.subreddit, comment.id);
        info!("Trigger comment: {:?}", comment.body.trim());

        match self.responder.respond(comment).await {
            Ok(text) => match self.reply_with_retry(comment, &text, shutdown).await {
                Ok(()) => {
                    self.stats.record_written();
                    info!(comment_id = %comment.id, "Replied successfully");
                }
                Err(e) => error!(comment_id = %comment.id, "Failed to post reply: {e}"),
            },
            Err(e) => error!(comment_id = %comment.id, "Failed to generate reply: {e}"),
        }

        sleep_or_shutdown(self.settings.courtesy_delay, shutdown).await
    }

    async fn reply_with_retry(
        &self,
        comment: &Comment,
        text: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), PlatformError> {
        let attempts = self.settings.reply_retries;
        let mut attempt = 0;
        loop {
            match self.platform.reply(comment, text).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < attempts => {
                    let wait = reply_backoff(attempt);
                    warn!(
                        "Reply failed (attempt {}/{}): {} - retrying in {}s",
                        attempt + 1,
                        attempts,
                        e,
                        wait.as_secs()
                    );
                    if sleep_or_shutdown(wait, shutdown).await {
                        return Err(e);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
