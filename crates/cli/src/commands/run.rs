//! `summonbot run`: the long-running listener.

use std::error::Error;
use std::sync::Arc;

use summonbot_agent::ThreadResponder;
use summonbot_channels::{CommentListener, ListenerSettings, RedditPlatform};
use summonbot_config::AppConfig;
use summonbot_core::{Platform, Trigger};
use tokio::sync::watch;
use tracing::{info, warn};

/// Listen until Ctrl-C. Returns the process exit code.
pub async fn run(config: AppConfig) -> Result<i32, Box<dyn Error>> {
    let missing = config.required_missing();
    if !missing.is_empty() {
        return Err(format!(
            "Missing required settings: {}. Run `summonbot doctor` for details.",
            missing.join(", ")
        )
        .into());
    }

    let platform: Arc<dyn Platform> =
        Arc::new(RedditPlatform::from_config(&config.reddit, &config.listener)?);
    let responder = Arc::new(ThreadResponder::new(
        platform.clone(),
        super::build_answerer(&config)?,
    ));
    let listener = CommentListener::new(
        platform,
        responder,
        Trigger::new(&config.listener.trigger_names)?,
        ListenerSettings::from_config(&config.listener),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => warn!("Could not install Ctrl-C handler: {e}"),
        }
    });

    info!(
        subreddits = ?config.listener.subreddits,
        triggers = ?config.listener.trigger_names,
        model = %config.provider.model,
        "summonbot listening"
    );
    let exit = listener.run(shutdown_rx).await;
    Ok(exit.exit_code())
}
