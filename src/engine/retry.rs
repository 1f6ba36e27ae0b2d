//! Retry with exponential backoff for transient step failures.
//!
//! Only errors classified retryable by [`Error::is_retryable`] are
//! retried. Terminal failures (bad config, missing credentials, quota,
//! open circuit) return immediately; retrying them would just repeat the
//! same refusal and waste the attempt budget.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Backoff schedule for retryable failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub delay_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            delay_cap: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after a failed `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.delay_cap)
    }
}

/// Run `operation` until it succeeds, fails terminally, or the attempt
/// budget is spent. The closure receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
            Err(e) => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
