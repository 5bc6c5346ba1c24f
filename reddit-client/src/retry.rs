use std::future::Future;
use std::time::Duration;
use sweeper_core::{CoreError, ErrorExt, RedditApiError};
use tokio::time::sleep;
use tracing::{debug, info};

/// Configuration for retrying idempotent reads.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Short backoff so a retried read still fits inside one sweep tick.
    pub fn reddit() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms);
    let exponential_delay = Duration::from_millis(delay_ms);

    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    (exponential_delay + Duration::from_millis(jitter)).min(max_delay)
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of attempts. Rate limits wait for the server-provided delay
/// when it is shorter than `max_delay_ms`; otherwise the error is returned.
pub async fn retry_read<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation = operation_name, retries = attempt, "Read succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                attempt += 1;
                if attempt >= config.max_attempts || !error.is_retryable() {
                    return Err(error);
                }

                let delay = match &error {
                    CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after }) => {
                        let delay = Duration::from_secs(*retry_after);
                        if delay > Duration::from_millis(config.max_delay_ms) {
                            return Err(error);
                        }
                        delay
                    }
                    _ => calculate_delay(attempt - 1, config),
                };

                debug!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    exception = %error,
                    "Retrying read"
                );
                sleep(delay).await;
            }
        }
    }
}
