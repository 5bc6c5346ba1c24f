pub mod api;
pub mod auth;
pub mod rate_limiter;
pub mod retry;


pub use auth::{AuthState, RedditAuth, RedditToken};
pub use retry::RetryConfig;

use api::RedditApiClient;
use async_trait::async_trait;
use sweeper_core::{
    ClientConfig, Comment, CoreError, PlatformFacade, RedditApiError, Submission,
    SubmissionSnapshot, MAX_LISTING_RANK,
};
use tracing::{debug, info, warn};

/// Reddit's page size cap for listings and `/api/info`.
const PAGE_SIZE: usize = 100;

/// Production [`PlatformFacade`] backed by Reddit's OAuth API.
#[derive(Debug)]
pub struct RedditClient {
    auth: RedditAuth,
    api: RedditApiClient,
    retry: RetryConfig,
}

impl RedditClient {
    pub fn new(config: &ClientConfig) -> Result<Self, CoreError> {
        Ok(Self {
            auth: RedditAuth::new(config)?,
            api: RedditApiClient::new(&config.user_agent)?,
            retry: RetryConfig::reddit(),
        })
    }

    pub async fn get_auth_state(&self) -> AuthState {
        self.auth.auth_state().await
    }

    pub async fn get_rate_limit_status(&self) -> rate_limiter::RateLimitStatus {
        self.api.get_rate_limit_status().await
    }

    /// Revokes the session token. Safe to call more than once.
    pub async fn close(&self) {
        if let Err(e) = self.auth.revoke().await {
            warn!(exception = %e, "Failed to revoke Reddit token during shutdown");
        }
    }

    async fn token(&self) -> Result<String, CoreError> {
        self.auth.access_token().await
    }

    /// Drops the cached token when Reddit rejected it.
    async fn checked<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            self.auth.invalidate().await;
        }
        result
    }
}

fn fullname(id: &str) -> String {
    format!("t3_{}", id)
}

/// A 404 on a subreddit listing means the subreddit is gone or never existed.
pub(crate) fn listing_error(subreddit: &str, error: CoreError) -> CoreError {
    match error {
        CoreError::NotFound { .. } => CoreError::RedditApi(RedditApiError::SubredditNotFound {
            subreddit: subreddit.to_string(),
        }),
        other => other,
    }
}

#[async_trait]
impl PlatformFacade for RedditClient {
    async fn fetch_hot_window(
        &self,
        subreddit: &str,
        minimum_rank: u32,
        maximum_rank: u32,
    ) -> Result<SubmissionSnapshot, CoreError> {
        let token = self.token().await?;
        let wanted = maximum_rank.min(MAX_LISTING_RANK) as usize;
        let mut collected: Vec<Submission> = Vec::with_capacity(wanted);
        let mut after: Option<String> = None;

        while collected.len() < wanted {
            let limit = (wanted - collected.len()).min(PAGE_SIZE) as u32;
            let after_ref = after.as_deref();
            let result = retry::retry_read(&self.retry, "get_hot", || {
                self.api.get_hot(&token, subreddit, limit, after_ref)
            })
            .await;
            let listing = self
                .checked(result)
                .await
                .map_err(|e| listing_error(subreddit, e))?;

            let page_len = listing.data.children.len();
            collected.extend(listing.data.children.into_iter().map(|c| Submission::from(c.data)));
            after = listing.data.after;
            if page_len == 0 || after.is_none() {
                break;
            }
        }

        let window: Vec<Submission> = collected
            .into_iter()
            .skip(minimum_rank as usize)
            .take(maximum_rank.saturating_sub(minimum_rank) as usize)
            .collect();

        debug!(
            subreddit,
            minimum_rank,
            maximum_rank,
            count = window.len(),
            "Fetched hot window"
        );
        Ok(SubmissionSnapshot::new(window))
    }

    async fn reload(&self, ids: &[String]) -> Result<Vec<Submission>, CoreError> {
        let token = self.token().await?;
        let mut reloaded = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(PAGE_SIZE) {
            let fullnames: Vec<String> = chunk.iter().map(|id| fullname(id)).collect();
            let result = retry::retry_read(&self.retry, "get_info", || {
                self.api.get_info(&token, &fullnames)
            })
            .await;
            let listing = self.checked(result).await?;
            reloaded.extend(listing.data.children.into_iter().map(|c| Submission::from(c.data)));
        }

        debug!(requested = ids.len(), found = reloaded.len(), "Reloaded submissions");
        Ok(reloaded)
    }

    async fn fetch_submission(&self, id: &str) -> Result<Submission, CoreError> {
        self.reload(&[id.to_string()])
            .await?
            .into_iter()
            .find(|submission| submission.id == id)
            .ok_or_else(|| {
                CoreError::RedditApi(RedditApiError::PostNotFound {
                    post_id: id.to_string(),
                })
            })
    }

    async fn top_comment(&self, submission_id: &str) -> Result<Option<Comment>, CoreError> {
        let token = self.token().await?;
        let result = retry::retry_read(&self.retry, "get_top_comment", || {
            self.api.get_top_comment(&token, submission_id)
        })
        .await;
        Ok(self.checked(result).await?.map(Comment::from))
    }

    async fn publish(&self, subreddit: &str, title: &str, url: &str) -> Result<String, CoreError> {
        let token = self.token().await?;
        let result = self.api.submit_link(&token, subreddit, title, url).await;
        let id = self.checked(result).await?;
        info!(subreddit, id = %id, url, "Published link submission");
        Ok(id)
    }

    async fn reply(&self, submission_id: &str, body: &str) -> Result<(), CoreError> {
        let token = self.token().await?;
        let result = self.api.comment(&token, &fullname(submission_id), body).await;
        self.checked(result).await?;
        info!(submission_id, "Posted reply");
        Ok(())
    }

    async fn user_submissions(
        &self,
        username: &str,
        limit: u32,
    ) -> Result<Vec<Submission>, CoreError> {
        let token = self.token().await?;
        let result = retry::retry_read(&self.retry, "get_user_submitted", || {
            self.api.get_user_submitted(&token, username, limit)
        })
        .await;
        let listing = self.checked(result).await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|c| Submission::from(c.data))
            .collect())
    }
}
