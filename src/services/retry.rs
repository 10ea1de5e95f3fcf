use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::AppResult;

/// Fixed-delay retry for portal calls
///
/// A call is attempted `retries + 1` times at most. Only retryable errors
/// (transport failures) trigger another attempt; everything else is returned
/// immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub async fn execute<F, Fut, T>(&self, operation: F, label: &str) -> AppResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let max_attempts = self.retries + 1;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}/{}", label, attempt, max_attempts);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    if attempt >= max_attempts {
                        warn!("{} failed after {} attempts: {}", label, attempt, error);
                        return Err(error);
                    }

                    warn!(
                        "{} attempt {}/{} failed: {}, retrying in {:?}",
                        label, attempt, max_attempts, error, self.delay
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
