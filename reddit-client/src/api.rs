use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use sweeper_core::{Comment, CoreError, RedditApiError, RemovalCategory, Submission};
use tracing::{debug, error, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub subreddit: String,
    pub permalink: String,
    #[serde(default)]
    pub url: String,
    pub score: i64,
    pub num_comments: u64,
    #[serde(default)]
    pub created_utc: f64,
    #[serde(default)]
    pub removed_by_category: Option<String>,
    #[serde(default = "default_indexable")]
    pub is_robot_indexable: bool,
    #[serde(default)]
    pub stickied: bool,
}

fn default_indexable() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    pub body: String,
    pub permalink: String,
    pub subreddit: String,
    pub link_id: String,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub distinguished: Option<String>,
}

/// Body of `api_type=json` write endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonApiResponse {
    pub json: JsonApiBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonApiBody {
    #[serde(default)]
    pub errors: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl JsonApiResponse {
    /// Reddit reports validation failures as `[code, message, field]` triples.
    pub fn error_summary(&self) -> Option<String> {
        if self.json.errors.is_empty() {
            return None;
        }
        let summary = self
            .json
            .errors
            .iter()
            .map(|triple| {
                triple
                    .iter()
                    .filter_map(|part| part.as_str())
                    .collect::<Vec<_>>()
                    .join(": ")
            })
            .collect::<Vec<_>>()
            .join("; ");
        Some(summary)
    }

    pub fn created_id(&self) -> Option<String> {
        self.json
            .data
            .as_ref()
            .and_then(|data| data.get("id"))
            .and_then(|id| id.as_str())
            .map(str::to_string)
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
}

impl RedditApiClient {
    pub fn new(user_agent: &str) -> Result<Self, CoreError> {
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth()));

        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter,
        })
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);
        let start_time = Instant::now();

        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            method = %method,
            endpoint,
            queue_wait_ms = permit.queue_wait_time.as_millis() as u64,
            "Acquired rate limit permit"
        );

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(method = %method, endpoint, exception = %e, "Network error");
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let (remaining, reset) = quota_headers(response.headers());
        self.rate_limiter.observe_headers(remaining, reset).await;

        let status = response.status();
        debug!(
            method = %method,
            endpoint,
            status = status.as_u16(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Reddit API request finished"
        );

        if let Some(err) = status_error(status, endpoint, reset) {
            warn!(method = %method, endpoint, status = status.as_u16(), "Request failed");
            return Err(err);
        }

        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, CoreError> {
        let response = self
            .make_request(Method::GET, endpoint, access_token, Some(query_params), None)
            .await?;
        parse_json(response, endpoint).await
    }

    async fn post_json_api(
        &self,
        endpoint: &str,
        access_token: &str,
        form: &[(&str, &str)],
    ) -> Result<JsonApiResponse, CoreError> {
        let response = self
            .make_request(Method::POST, endpoint, access_token, None, Some(form))
            .await?;
        parse_json(response, endpoint).await
    }

    pub async fn get_hot(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/hot", subreddit);
        let limit = limit.to_string();
        let mut params = vec![("limit", limit.as_str()), ("raw_json", "1")];
        if let Some(after) = after {
            params.push(("after", after));
        }
        self.get_json(&endpoint, access_token, &params).await
    }

    /// Looks up things by fullname (`t3_<id>`); at most 100 per call.
    pub async fn get_info(
        &self,
        access_token: &str,
        fullnames: &[String],
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let ids = fullnames.join(",");
        self.get_json("/api/info", access_token, &[("id", ids.as_str()), ("raw_json", "1")])
            .await
    }

    pub async fn get_top_comment(
        &self,
        access_token: &str,
        submission_id: &str,
    ) -> Result<Option<RedditCommentData>, CoreError> {
        let endpoint = format!("/comments/{}", submission_id);
        let listings: Vec<RedditListing<serde_json::Value>> = self
            .get_json(
                &endpoint,
                access_token,
                &[
                    ("limit", "1"),
                    ("depth", "1"),
                    ("sort", "confidence"),
                    ("raw_json", "1"),
                ],
            )
            .await?;
        first_comment(listings)
    }

    pub async fn get_user_submitted(
        &self,
        access_token: &str,
        username: &str,
        limit: u32,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/user/{}/submitted", username);
        let limit = limit.to_string();
        self.get_json(
            &endpoint,
            access_token,
            &[("sort", "new"), ("limit", limit.as_str()), ("raw_json", "1")],
        )
        .await
    }

    pub async fn submit_link(
        &self,
        access_token: &str,
        subreddit: &str,
        title: &str,
        url: &str,
    ) -> Result<String, CoreError> {
        let response = self
            .post_json_api(
                "/api/submit",
                access_token,
                &[
                    ("sr", subreddit),
                    ("kind", "link"),
                    ("title", title),
                    ("url", url),
                    ("resubmit", "true"),
                    ("api_type", "json"),
                ],
            )
            .await?;

        if let Some(reason) = response.error_summary() {
            return Err(CoreError::RedditApi(RedditApiError::SubmissionRejected {
                subreddit: subreddit.to_string(),
                reason,
            }));
        }
        response.created_id().ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "Submit response carried no submission id".to_string(),
            })
        })
    }

    pub async fn comment(
        &self,
        access_token: &str,
        parent_fullname: &str,
        text: &str,
    ) -> Result<(), CoreError> {
        let response = self
            .post_json_api(
                "/api/comment",
                access_token,
                &[
                    ("thing_id", parent_fullname),
                    ("text", text),
                    ("api_type", "json"),
                ],
            )
            .await?;

        match response.error_summary() {
            Some(details) => Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details,
            })),
            None => Ok(()),
        }
    }

    pub async fn get_rate_limit_status(&self) -> crate::rate_limiter::RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T, CoreError> {
    response.json().await.map_err(|e| {
        error!(endpoint, exception = %e, "Failed to parse Reddit response");
        CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Failed to parse response from {}", endpoint),
        })
    })
}

fn quota_headers(headers: &HeaderMap) -> (Option<f64>, Option<u64>) {
    let read = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
    let remaining = read("x-ratelimit-remaining").and_then(|v| v.parse::<f64>().ok());
    let reset = read("x-ratelimit-reset").and_then(|v| v.parse::<u64>().ok());
    (remaining, reset)
}

/// Maps a non-success status to the error the rest of the crate expects.
pub(crate) fn status_error(
    status: StatusCode,
    endpoint: &str,
    retry_after: Option<u64>,
) -> Option<CoreError> {
    if status.is_success() {
        return None;
    }
    let error = match status.as_u16() {
        401 => CoreError::RedditApi(RedditApiError::InvalidToken),
        403 => CoreError::RedditApi(RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        }),
        404 => CoreError::NotFound {
            resource: endpoint.to_string(),
        },
        429 => CoreError::RedditApi(RedditApiError::RateLimitExceeded {
            retry_after: retry_after.unwrap_or(60),
        }),
        code if status.is_server_error() => {
            CoreError::RedditApi(RedditApiError::ServerError { status_code: code })
        }
        code => CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Unexpected status {} from {}", code, endpoint),
        }),
    };
    Some(error)
}

/// The comments endpoint returns `[submission listing, comment listing]`.
pub(crate) fn first_comment(
    listings: Vec<RedditListing<serde_json::Value>>,
) -> Result<Option<RedditCommentData>, CoreError> {
    let Some(comments) = listings.into_iter().nth(1) else {
        return Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: "Comments response is missing the comment listing".to_string(),
        }));
    };

    // "more" placeholders are not comments.
    comments
        .data
        .children
        .into_iter()
        .find(|child| child.kind == "t1")
        .map(|child| serde_json::from_value(child.data))
        .transpose()
        .map_err(CoreError::from)
}

impl From<RedditPostData> for Submission {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: post_data.id,
            title: post_data.title,
            author: post_data.author,
            subreddit: post_data.subreddit,
            permalink: post_data.permalink,
            url: post_data.url,
            score: post_data.score,
            num_comments: post_data.num_comments,
            created_utc: post_data.created_utc as i64,
            removed_by_category: post_data.removed_by_category.map(RemovalCategory::from),
            is_robot_indexable: post_data.is_robot_indexable,
            stickied: post_data.stickied,
        }
    }
}

impl From<RedditCommentData> for Comment {
    fn from(comment: RedditCommentData) -> Self {
        Self {
            id: comment.id,
            body: comment.body,
            permalink: comment.permalink,
            subreddit: comment.subreddit,
            link_id: comment.link_id,
            stickied: comment.stickied,
            distinguished: comment.distinguished,
        }
    }
}
