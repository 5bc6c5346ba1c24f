//! Live feed of an account's new submissions built on listing polls.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use sweeper_core::{CoreError, PlatformFacade, Submission};
use tracing::debug;

/// Submissions requested per poll.
pub const FETCH_LIMIT: u32 = 100;

/// How many identifiers the stream remembers before forgetting the oldest.
pub const SEEN_CAPACITY: usize = 301;

/// What one call to [`SubmissionStream::next`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Item(Submission),
    /// Nothing new arrived; the consumer should pause before polling again.
    Heartbeat,
}

/// Yields submissions that appear after the stream was created.
///
/// The first poll only records what already exists. Each later poll queues
/// unseen submissions oldest first and hands them out one per call.
pub struct SubmissionStream {
    platform: Arc<dyn PlatformFacade>,
    username: String,
    seen: HashSet<String>,
    seen_order: VecDeque<String>,
    pending: VecDeque<Submission>,
    primed: bool,
}

impl SubmissionStream {
    pub fn new(platform: Arc<dyn PlatformFacade>, username: impl Into<String>) -> Self {
        Self {
            platform,
            username: username.into(),
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            pending: VecDeque::new(),
            primed: false,
        }
    }

    pub async fn next(&mut self) -> Result<StreamEvent, CoreError> {
        if let Some(submission) = self.pending.pop_front() {
            return Ok(StreamEvent::Item(submission));
        }

        let newest_first = self
            .platform
            .user_submissions(&self.username, FETCH_LIMIT)
            .await?;

        if !self.primed {
            for submission in newest_first.iter().rev() {
                self.remember(&submission.id);
            }
            self.primed = true;
            debug!(
                username = %self.username,
                existing = self.seen.len(),
                "Primed submission stream"
            );
            return Ok(StreamEvent::Heartbeat);
        }

        for submission in newest_first.into_iter().rev() {
            if self.remember(&submission.id) {
                self.pending.push_back(submission);
            }
        }

        Ok(self
            .pending
            .pop_front()
            .map(StreamEvent::Item)
            .unwrap_or(StreamEvent::Heartbeat))
    }

    /// Records `id`, returning false if it was already known.
    fn remember(&mut self, id: &str) -> bool {
        if !self.seen.insert(id.to_string()) {
            return false;
        }
        self.seen_order.push_back(id.to_string());
        if self.seen_order.len() > SEEN_CAPACITY {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}
