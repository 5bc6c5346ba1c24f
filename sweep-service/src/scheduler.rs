use crate::engine::{RemovalSweepEngine, SweepTarget};
use crate::stickied::StickiedReplyWatcher;
use std::sync::Arc;
use sweeper_core::{Config, PlatformFacade};
use tokio::task::JoinSet;
use tracing::{error, info};

/// Supervises one sweep engine per crosspost target plus the reply watcher.
pub struct Scheduler {
    platform: Arc<dyn PlatformFacade>,
    engines: Vec<RemovalSweepEngine>,
    watcher: Option<StickiedReplyWatcher>,
}

impl Scheduler {
    pub fn new(platform: Arc<dyn PlatformFacade>) -> Self {
        Self {
            platform,
            engines: Vec::new(),
            watcher: None,
        }
    }

    /// Builds engines for every `[[crosspost_subreddits]]` entry and, unless
    /// disabled, a watcher for the configured account.
    pub fn from_config(platform: Arc<dyn PlatformFacade>, config: &Config) -> Self {
        let mut scheduler = Self::new(platform);
        for target in &config.crosspost_subreddits {
            scheduler.add_target(SweepTarget::from_config(&config.sweep_subreddit, target));
        }
        if config.stickied_reply.enabled {
            scheduler.watcher = Some(StickiedReplyWatcher::new(
                scheduler.platform.clone(),
                config.client.username.clone(),
                &config.stickied_reply,
            ));
        }
        scheduler
    }

    pub fn add_target(&mut self, target: SweepTarget) {
        self.engines
            .push(RemovalSweepEngine::new(self.platform.clone(), target));
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    pub fn has_watcher(&self) -> bool {
        self.watcher.is_some()
    }

    /// Runs every task until all of them have stopped. Tasks are meant to run
    /// forever, so returning at all is an anomaly the caller should treat as
    /// fatal.
    pub async fn run(self) {
        let mut tasks = JoinSet::new();

        for engine in self.engines {
            let name = format!(
                "sweep:{}->{}",
                engine.target().source_subreddit,
                engine.target().crosspost_subreddit
            );
            tasks.spawn(async move {
                engine.run().await;
                name
            });
        }
        if let Some(watcher) = self.watcher {
            tasks.spawn(async move {
                watcher.run().await;
                "stickied-reply-watcher".to_string()
            });
        }

        info!(tasks = tasks.len(), "Scheduler started");

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(name) => error!(task = %name, "Supervised task stopped"),
                Err(e) => error!(exception = %e, "Supervised task panicked"),
            }
        }
    }
}
