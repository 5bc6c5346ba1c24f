use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    ResourceOwnerPassword, ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use std::time::{Duration, SystemTime};
use sweeper_core::{ClientConfig, CoreError, RedditApiError};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const REDDIT_REVOKE_URL: &str = "https://www.reddit.com/api/v1/revoke_token";

/// Renew this long before Reddit's stated expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_fresh(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN < self.expires_at
    }
}

impl std::fmt::Debug for RedditToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditToken")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { expires_at: SystemTime },
    TokenExpired { expired_at: SystemTime },
}

/// Script-app authentication using the OAuth2 password grant.
#[derive(Debug)]
pub struct RedditAuth {
    oauth_client: BasicClient,
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    username: ResourceOwnerUsername,
    password: ResourceOwnerPassword,
    token: RwLock<Option<RedditToken>>,
    renew_lock: Mutex<()>,
}

impl RedditAuth {
    pub fn new(config: &ClientConfig) -> Result<Self, CoreError> {
        let invalid_url = |e: oauth2::url::ParseError| CoreError::Internal {
            message: format!("Invalid OAuth URL: {e}"),
        };
        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(invalid_url)?,
            Some(TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(invalid_url)?),
        );

        // Token requests must not follow redirects and need Reddit's user agent.
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            oauth_client,
            http_client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: ResourceOwnerUsername::new(config.username.clone()),
            password: ResourceOwnerPassword::new(config.password.clone()),
            token: RwLock::new(None),
            renew_lock: Mutex::new(()),
        })
    }

    pub async fn auth_state(&self) -> AuthState {
        match self.token.read().await.as_ref() {
            None => AuthState::NotAuthenticated,
            Some(token) if token.is_fresh() => AuthState::Authenticated {
                expires_at: token.expires_at,
            },
            Some(token) => AuthState::TokenExpired {
                expired_at: token.expires_at,
            },
        }
    }

    /// A usable bearer token, authenticating first when needed.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let _guard = self.renew_lock.lock().await;
        // Another task may have renewed while we waited.
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let token = self.authenticate().await?;
        let access_token = token.access_token.clone();
        *self.token.write().await = Some(token);
        Ok(access_token)
    }

    /// Forgets the cached token so the next call authenticates again.
    pub async fn invalidate(&self) {
        if self.token.write().await.take().is_some() {
            debug!("Discarded rejected access token");
        }
    }

    async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        debug!(username = self.username.as_str(), "Requesting access token");
        let http_client = self.http_client.clone();
        let response = self
            .oauth_client
            .exchange_password(&self.username, &self.password)
            .request_async(|request| send_token_request(http_client, request))
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(response) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: response.to_string(),
                    })
                }
                RequestTokenError::Request(e) => CoreError::Network(e),
                other => CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: other.to_string(),
                }),
            })?;

        let expires_in = response.expires_in().unwrap_or(Duration::from_secs(3600));
        let scope = response
            .scopes()
            .map(|scopes| scopes.iter().map(|scope| String::clone(scope)).collect())
            .unwrap_or_default();

        info!(
            username = self.username.as_str(),
            expires_in = expires_in.as_secs(),
            "Authenticated with Reddit"
        );

        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + expires_in,
            scope,
        })
    }

    /// Revokes the cached token, if any.
    pub async fn revoke(&self) -> Result<(), CoreError> {
        let Some(token) = self.token.write().await.take() else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(REDDIT_REVOKE_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("token", token.access_token.as_str()),
                ("token_type_hint", "access_token"),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            info!("Revoked Reddit access token");
        } else {
            warn!(status = response.status().as_u16(), "Token revocation was not accepted");
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn set_token(&self, token: RedditToken) {
        *self.token.write().await = Some(token);
    }
}

async fn send_token_request(
    http_client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http_client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().to_owned();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}
