use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PilotResult;

/// Retry policy for transient provider failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,
}

fn default_max_retries() -> u32 {
    10
}

fn default_backoff_base() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
        }
    }
}

/// Retries rate-limit and transient gateway errors with exponential backoff.
///
/// Every other error is returned at once. After `max_retries` retries the
/// last transient error is returned, so an operation runs at most
/// `max_retries + 1` times.
#[derive(Debug, Clone, Default)]
pub struct RetryHandler {
    config: RetryConfig,
}

impl RetryHandler {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before retry number `attempt` (0-based): `base ^ (attempt + 2)` seconds
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let secs = self.config.backoff_base.powi(attempt as i32 + 2);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    pub async fn run<F, Fut, T>(&self, mut op: F) -> PilotResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PilotResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_secs = delay.as_secs_f64(),
                        error = %e,
                        "transient provider error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!(attempts = attempt + 1, error = %e, "retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
