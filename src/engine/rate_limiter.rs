//! Per-tenant monthly rate limiting.
//!
//! Quota counters are scoped to a calendar month derived from the
//! current UTC time, so the composite key for a tenant is
//! `{tenant}:{YYYY-MM}`. The counter lives in a [`QuotaStore`] whose
//! increment must be atomic: concurrent executions for the same tenant
//! contend on the same key, and a lost increment would under-count.
//! Slight overshoot under heavy concurrency is an accepted soft-limit
//! property; the check never partially admits an execution.
//!
//! If the backing store is unreachable the limiter **fails open**: a
//! false rejection would block every automation a tenant has, which is
//! worse than briefly exceeding a quota.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use tracing::warn;

use crate::storage::QuotaStore;

/// Outcome of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Requests left in the current window (0 when denied or unknown).
    pub remaining: u64,
    /// When the current window resets.
    pub reset_at: DateTime<Utc>,
}

/// Sliding monthly-window rate limiter over a [`QuotaStore`].
pub struct RateLimiter {
    store: Arc<dyn QuotaStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Increment the counter for `key`'s current monthly window and
    /// decide whether the request is within `max_requests`.
    pub async fn check_limit(&self, key: &str, max_requests: u64) -> RateLimitDecision {
        let now = Utc::now();
        let reset_at = window_reset(now);

        match self.store.increment_and_get(&month_key(key, now)).await {
            Ok(count) => RateLimitDecision {
                allowed: count <= max_requests,
                remaining: max_requests.saturating_sub(count),
                reset_at,
            },
            Err(e) => {
                warn!(key, error = %e, "Quota store unreachable, failing open");
                RateLimitDecision {
                    allowed: true,
                    remaining: 0,
                    reset_at,
                }
            }
        }
    }
}

/// Composite counter key for the calendar month containing `now`.
pub fn month_key(key: &str, now: DateTime<Utc>) -> String {
    format!("{}:{:04}-{:02}", key, now.year(), now.month())
}

/// First instant of the month following `now`.
pub fn window_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let first_of_month = now.date_naive().with_day(1).expect("day 1 is valid");
    let next_month = first_of_month + Months::new(1);
    Utc.from_utc_datetime(&next_month.and_hms_opt(0, 0, 0).expect("midnight is valid"))
}
