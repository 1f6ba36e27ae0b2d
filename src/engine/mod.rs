//! Execution engine: orchestration, retries, rate limiting and circuit
//! breaking.

pub mod circuit_breaker;
pub mod orchestrator;
pub mod rate_limiter;
pub mod retry;

pub use circuit_breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use orchestrator::{CancelSignal, Orchestrator};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use retry::{with_retry, RetryPolicy};
