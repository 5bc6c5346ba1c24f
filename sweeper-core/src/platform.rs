//! The seam between the sweeper and the content platform.

use crate::error::CoreError;
use crate::snapshot::SubmissionSnapshot;
use crate::types::{Comment, Submission};
use async_trait::async_trait;

/// Remote operations the sweeper and the reply watcher depend on.
///
/// Every call may fail; a successful call with nothing to return yields an
/// empty value rather than an error.
#[async_trait]
pub trait PlatformFacade: Send + Sync {
    /// The slice `[minimum_rank, maximum_rank)` of a subreddit's hot listing.
    async fn fetch_hot_window(
        &self,
        subreddit: &str,
        minimum_rank: u32,
        maximum_rank: u32,
    ) -> Result<SubmissionSnapshot, CoreError>;

    /// Fresh copies of the given submissions. Identifiers the platform no
    /// longer knows about are left out of the result.
    async fn reload(&self, ids: &[String]) -> Result<Vec<Submission>, CoreError>;

    async fn fetch_submission(&self, id: &str) -> Result<Submission, CoreError>;

    /// Highest ranked top-level comment of a submission.
    async fn top_comment(&self, submission_id: &str) -> Result<Option<Comment>, CoreError>;

    /// Submits a link post and returns the new submission's id.
    async fn publish(&self, subreddit: &str, title: &str, url: &str) -> Result<String, CoreError>;

    async fn reply(&self, submission_id: &str, body: &str) -> Result<(), CoreError>;

    /// A user's submissions, newest first.
    async fn user_submissions(
        &self,
        username: &str,
        limit: u32,
    ) -> Result<Vec<Submission>, CoreError>;
}
