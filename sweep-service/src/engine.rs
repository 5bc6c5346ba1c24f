use crate::title::format_title;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use sweeper_core::{
    CoreError, CrosspostTargetConfig, ErrorExt, PlatformFacade, RankedSubmission,
    SubmissionSnapshot,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One configured crosspost target: where to look and where to post.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepTarget {
    pub source_subreddit: String,
    pub crosspost_subreddit: String,
    pub minimum_rank: u32,
    pub maximum_rank: u32,
    pub interval: Duration,
}

impl SweepTarget {
    pub fn from_config(source_subreddit: &str, config: &CrosspostTargetConfig) -> Self {
        Self {
            source_subreddit: source_subreddit.to_string(),
            crosspost_subreddit: config.subreddit.clone(),
            minimum_rank: config.minimum_rank,
            maximum_rank: config.maximum_rank,
            interval: config.interval(),
        }
    }

    /// A tick must finish one second before the next one is due.
    pub fn tick_budget(&self) -> Duration {
        self.interval.saturating_sub(Duration::from_secs(1))
    }

    /// 1-based rank of a submission last seen at `position` in this window.
    pub fn rank_at(&self, position: usize) -> usize {
        position + self.minimum_rank as usize + 1
    }
}

/// Counters describing one completed tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fetched: usize,
    pub dropped: usize,
    pub removed: usize,
    pub published: usize,
    pub failed: usize,
}

/// Watches one hot window and crossposts submissions moderators removed
/// from it.
///
/// The engine owns the last fetched window. A tick replaces it only after
/// every step has finished, so an aborted or abandoned tick leaves the
/// previous baseline in place for the next attempt.
pub struct RemovalSweepEngine {
    platform: Arc<dyn PlatformFacade>,
    target: SweepTarget,
    snapshot: SubmissionSnapshot,
}

impl RemovalSweepEngine {
    pub fn new(platform: Arc<dyn PlatformFacade>, target: SweepTarget) -> Self {
        Self {
            platform,
            target,
            snapshot: SubmissionSnapshot::empty(),
        }
    }

    pub fn target(&self) -> &SweepTarget {
        &self.target
    }

    pub fn snapshot(&self) -> &SubmissionSnapshot {
        &self.snapshot
    }

    /// Runs one fetch, diff, reload, filter, publish cycle.
    ///
    /// Fetch and reload errors abort the tick with the snapshot untouched.
    /// Publish errors are logged and counted; the snapshot is still replaced
    /// because the removals they belong to were real.
    pub async fn tick(&mut self) -> Result<TickReport, CoreError> {
        let fresh = self
            .platform
            .fetch_hot_window(
                &self.target.source_subreddit,
                self.target.minimum_rank,
                self.target.maximum_rank,
            )
            .await?;

        let dropped = self.snapshot.diff(&fresh);
        let removed = self.removed_candidates(&dropped).await?;

        let outcomes = join_all(removed.iter().map(|ranked| self.publish(ranked))).await;
        let published = outcomes.iter().filter(|outcome| outcome.is_ok()).count();

        let report = TickReport {
            fetched: fresh.len(),
            dropped: dropped.len(),
            removed: removed.len(),
            published,
            failed: outcomes.len() - published,
        };

        self.snapshot = fresh;
        Ok(report)
    }

    /// Reloads the dropped submissions and keeps the moderator removals,
    /// ranked by where they sat in the previous window.
    async fn removed_candidates(
        &self,
        dropped: &SubmissionSnapshot,
    ) -> Result<Vec<RankedSubmission>, CoreError> {
        if dropped.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = dropped.iter().map(|s| s.id.clone()).collect();
        let reloaded = SubmissionSnapshot::new(self.platform.reload(&ids).await?);

        for missing in ids.iter().filter(|id| !reloaded.contains(id.as_str())) {
            debug!(
                subreddit = %self.target.source_subreddit,
                id = %missing,
                "Dropped submission no longer exists"
            );
        }

        let mut ranked: Vec<RankedSubmission> = reloaded
            .removed()
            .into_iter()
            .filter_map(|submission| {
                let position = self.snapshot.position(&submission.id)?;
                Some(RankedSubmission {
                    rank: self.target.rank_at(position),
                    submission,
                })
            })
            .collect();
        ranked.sort_by_key(|r| r.rank);
        Ok(ranked)
    }

    async fn publish(&self, ranked: &RankedSubmission) -> Result<String, CoreError> {
        let submission = &ranked.submission;
        let title = format_title(
            ranked.rank,
            submission.score,
            submission.num_comments,
            &submission.title,
            &submission.subreddit,
        );
        let url = submission.absolute_permalink();

        let result = self
            .platform
            .publish(&self.target.crosspost_subreddit, &title, &url)
            .await;

        match &result {
            Ok(crosspost_id) => info!(
                subreddit = %submission.subreddit,
                target = %self.target.crosspost_subreddit,
                id = %submission.id,
                crosspost_id = %crosspost_id,
                rank = ranked.rank,
                "Crossposted removed submission"
            ),
            Err(e) => {
                warn!(
                    subreddit = %submission.subreddit,
                    target = %self.target.crosspost_subreddit,
                    id = %submission.id,
                    rank = ranked.rank,
                    "Failed to crosspost removed submission"
                );
                e.log_warn();
            }
        }
        result
    }

    /// Runs [`tick`](Self::tick) under the tick budget and logs the outcome.
    ///
    /// A tick that overruns the budget is dropped and reported as
    /// [`CoreError::Timeout`]. Errors are logged here, so callers may ignore
    /// them.
    pub async fn run_tick(&mut self) -> Result<TickReport, CoreError> {
        let tick_id = Uuid::new_v4();
        let budget = self.target.tick_budget();

        let outcome = match tokio::time::timeout(budget, self.tick()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CoreError::Timeout {
                seconds: budget.as_secs(),
            }),
        };

        match &outcome {
            Ok(report) => info!(
                tick_id = %tick_id,
                subreddit = %self.target.source_subreddit,
                target = %self.target.crosspost_subreddit,
                fetched = report.fetched,
                dropped = report.dropped,
                removed = report.removed,
                published = report.published,
                failed = report.failed,
                "Sweep tick completed"
            ),
            Err(e) => {
                warn!(
                    tick_id = %tick_id,
                    subreddit = %self.target.source_subreddit,
                    target = %self.target.crosspost_subreddit,
                    "Sweep tick abandoned, keeping previous snapshot"
                );
                e.log_error();
            }
        }
        outcome
    }

    /// Ticks forever on the target's interval. A tick always finishes or is
    /// abandoned before the next one starts.
    pub async fn run(mut self) {
        info!(
            subreddit = %self.target.source_subreddit,
            target = %self.target.crosspost_subreddit,
            minimum_rank = self.target.minimum_rank,
            maximum_rank = self.target.maximum_rank,
            interval_secs = self.target.interval.as_secs(),
            "Starting removal sweep"
        );

        let mut ticker = tokio::time::interval(self.target.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            // Already logged; the next tick retries from the same snapshot.
            let _ = self.run_tick().await;
        }
    }
}
