//! TOML configuration for the sweeper binary.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SWEEP_SUBREDDIT: &str = "all";

/// Reddit stops paging listings at roughly this many items.
pub const MAX_LISTING_RANK: u32 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    pub crosspost_subreddits: Vec<CrosspostTargetConfig>,
    #[serde(default = "default_sweep_subreddit")]
    pub sweep_subreddit: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub stickied_reply: StickiedReplyConfig,
}

#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

// Keep secrets out of logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrosspostTargetConfig {
    pub subreddit: String,
    pub minimum_rank: u32,
    pub maximum_rank: u32,
    /// Seconds between sweeps.
    pub interval: u64,
}

impl CrosspostTargetConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StickiedReplyConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    #[serde(default = "default_stream_retry_interval")]
    pub stream_retry_interval: u64,
}

impl Default for StickiedReplyConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval: default_poll_interval(),
            stream_retry_interval: default_stream_retry_interval(),
        }
    }
}

fn default_sweep_subreddit() -> String {
    DEFAULT_SWEEP_SUBREDDIT.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

fn default_stream_retry_interval() -> u64 {
    300
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            },
        })?;
        let config = Self::from_toml(&contents)?;
        tracing::debug!(
            path = %path.display(),
            targets = config.crosspost_subreddits.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let credentials = [
            ("client.client_id", &self.client.client_id),
            ("client.client_secret", &self.client.client_secret),
            ("client.username", &self.client.username),
            ("client.password", &self.client.password),
            ("client.user_agent", &self.client.user_agent),
        ];
        for (field, value) in credentials {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        if self.sweep_subreddit.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "sweep_subreddit".to_string(),
            });
        }

        if self.crosspost_subreddits.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "at least one [[crosspost_subreddits]] entry is required".to_string(),
            });
        }

        for target in &self.crosspost_subreddits {
            if target.subreddit.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "crosspost_subreddits.subreddit".to_string(),
                });
            }
            if target.maximum_rank <= target.minimum_rank {
                return Err(ConfigError::InvalidValue {
                    field: format!("crosspost_subreddits[{}].maximum_rank", target.subreddit),
                    value: format!(
                        "{} (must be greater than minimum_rank {})",
                        target.maximum_rank, target.minimum_rank
                    ),
                });
            }
            if target.maximum_rank > MAX_LISTING_RANK {
                return Err(ConfigError::InvalidValue {
                    field: format!("crosspost_subreddits[{}].maximum_rank", target.subreddit),
                    value: format!(
                        "{} (listings end at rank {})",
                        target.maximum_rank, MAX_LISTING_RANK
                    ),
                });
            }
            // The tick budget is interval - 1 seconds.
            if target.interval < 2 {
                return Err(ConfigError::InvalidValue {
                    field: format!("crosspost_subreddits[{}].interval", target.subreddit),
                    value: format!("{} (must be at least 2 seconds)", target.interval),
                });
            }
        }

        if self.stickied_reply.poll_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stickied_reply.poll_interval".to_string(),
                value: "0".to_string(),
            });
        }
        if self.stickied_reply.stream_retry_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stickied_reply.stream_retry_interval".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}
