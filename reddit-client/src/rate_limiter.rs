use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub time_window: Duration,
    pub burst_allowance: u32,
}

impl RateLimitConfig {
    pub fn reddit_oauth() -> Self {
        Self {
            max_requests: 100, // Reddit allows 100 requests per minute for OAuth2
            time_window: Duration::from_secs(60),
            burst_allowance: 10,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    // Set when Reddit reports the quota is exhausted.
    blocked_until: Option<Instant>,
}

#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = config.burst_allowance as f64;
        let refill_rate = config.max_requests as f64 / config.time_window.as_secs_f64();

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
                blocked_until: None,
            }),
            capacity,
            refill_rate,
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.duration_since(state.last_refill);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Takes `tokens_needed` tokens, or returns how long to wait for them.
    pub async fn acquire(&self, tokens_needed: f64) -> Result<(), Duration> {
        let now = Instant::now();
        let mut state = self.state.lock().await;

        if let Some(until) = state.blocked_until {
            if until > now {
                return Err(until - now);
            }
            state.blocked_until = None;
        }

        self.refill(&mut state, now);
        if state.tokens >= tokens_needed {
            state.tokens -= tokens_needed;
            Ok(())
        } else {
            let missing = tokens_needed - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate))
        }
    }

    pub async fn available_tokens(&self) -> f64 {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    /// Applies Reddit's `x-ratelimit-remaining` / `x-ratelimit-reset` headers.
    pub async fn observe_quota(&self, remaining: f64, reset_in: Duration) {
        let mut state = self.state.lock().await;
        if remaining < 1.0 {
            state.tokens = 0.0;
            state.blocked_until = Some(Instant::now() + reset_in);
        } else if remaining < state.tokens {
            state.tokens = remaining;
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    token_bucket: TokenBucket,
    semaphore: Arc<Semaphore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.burst_allowance as usize));
        let token_bucket = TokenBucket::new(&config);

        Self {
            token_bucket,
            semaphore,
            config,
        }
    }

    pub async fn acquire_permit(&self) -> RateLimitPermit {
        let start_time = Instant::now();
        // The semaphore is owned here and never closed.
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        loop {
            match self.token_bucket.acquire(1.0).await {
                Ok(()) => break,
                Err(wait_time) => {
                    tracing::debug!(wait_ms = wait_time.as_millis() as u64, "Rate limit reached, waiting");
                    sleep(wait_time).await;
                }
            }
        }

        RateLimitPermit {
            _permit: permit,
            queue_wait_time: start_time.elapsed(),
        }
    }

    pub async fn observe_headers(&self, remaining: Option<f64>, reset_secs: Option<u64>) {
        if let Some(remaining) = remaining {
            let reset_in = Duration::from_secs(reset_secs.unwrap_or(60));
            if remaining < 1.0 {
                tracing::warn!(reset_secs = reset_in.as_secs(), "Reddit quota exhausted");
            }
            self.token_bucket.observe_quota(remaining, reset_in).await;
        }
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        let available_tokens = self.token_bucket.available_tokens().await;
        RateLimitStatus {
            available_tokens: available_tokens as u32,
            max_tokens: self.config.burst_allowance,
            available_permits: self.semaphore.available_permits(),
            requests_per_minute: self.config.max_requests,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitPermit {
    _permit: Option<tokio::sync::OwnedSemaphorePermit>,
    pub queue_wait_time: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub max_tokens: u32,
    pub available_permits: usize,
    pub requests_per_minute: u32,
}
