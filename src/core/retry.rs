use crate::config::config::RetryCfg;
use crate::core::error::SourceError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait Sleeper: Send + Sync + 'static {
    async fn sleep(&self, delay: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl From<&RetryCfg> for RetryPolicy {
    fn from(cfg: &RetryCfg) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: cfg.initial_backoff,
            max_backoff: cfg.max_backoff,
            multiplier: cfg.multiplier.max(1.0),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), capped at `max_backoff`
    /// before it is turned back into a `Duration`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Exhaustion maps to `SourceError::Unavailable`.
    pub async fn run<T, F, Fut>(&self, sleeper: &dyn Sleeper, mut op: F) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt - 1);
                    warn!(attempt, ?delay, "quota exhausted, backing off");
                    sleeper.sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(SourceError::Unavailable { attempts: attempt });
                }
                Err(e) => return Err(e),
            }
        }
    }
}
