// harvester-core/src/domain/retry.rs

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::warn;
use validator::Validate;

/// Indicates whether an error should be retried or treated as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

/// The `extraction.retry` config section.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: usize,
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_seconds: default_delay_seconds(),
            backoff: Backoff::Fixed,
        }
    }
}

fn default_max_attempts() -> usize {
    3
}
fn default_delay_seconds() -> u64 {
    5
}

/// Re-runs a whole operation on retryable errors.
///
/// Each attempt starts the operation from scratch. Once attempts are exhausted
/// (or the error is fatal) the last error is returned unchanged.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(cfg: RetryConfig) -> Self {
        Self::new(cfg.max_attempts, Duration::from_secs(cfg.delay_seconds), cfg.backoff)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff,
        }
    }

    /// Single attempt, no delay.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Backoff::Fixed)
    }

    pub async fn run<F, Fut, T, E, Classifier>(&self, mut op: F, classify: Classifier) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        Classifier: Fn(&E) -> RetryDisposition,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(err) => match classify(&err) {
                    RetryDisposition::Stop => return Err(err),
                    RetryDisposition::Retry => {
                        if attempt + 1 >= self.max_attempts {
                            return Err(err);
                        }
                        let delay = self.delay_for(attempt);
                        warn!(
                            attempt = attempt + 1,
                            max_attempts = self.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Attempt failed, retrying: {}",
                            err
                        );
                        sleep(delay).await;
                        attempt += 1;
                    }
                },
            }
        }
    }

    pub fn delay_for(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 1u32 << attempt.min(6);
                self.delay.saturating_mul(factor)
            }
        }
    }
}
