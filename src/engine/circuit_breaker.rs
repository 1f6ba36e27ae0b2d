//! Circuit breaker for external integration calls.
//!
//! One breaker guards each integration name, shared by every execution
//! that touches that integration. A breaker that opens for a failing
//! dependency protects all tenants from hammering it and from waiting
//! out long timeouts behind each step.
//!
//! ## States
//!
//! - **Closed**: normal operation, calls pass through
//! - **Open**: calls are routed to the fallback without touching the
//!   integration, until `timeout` has elapsed since opening
//! - **HalfOpen**: probe calls allowed through to test recovery
//!
//! ## Configuration
//!
//! - `failure_threshold`: consecutive failures before opening (default: 5)
//! - `success_threshold`: successes in half-open to close (default: 2)
//! - `timeout`: how long to stay open before half-open (default: 30s)

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::Result;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Successes in half-open needed to close the circuit
    pub success_threshold: u32,
    /// How long to stay open before transitioning to half-open
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Circuit breaker for a single integration.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    /// Current state (0=Closed, 1=Open, 2=HalfOpen)
    state: AtomicU32,
    /// Consecutive failure count
    failure_count: AtomicU32,
    /// Consecutive success count (in half-open state)
    success_count: AtomicU32,
    /// Timestamp when circuit opened (unix millis)
    opened_at: AtomicU64,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: AtomicU32::new(0),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
        }
    }

    /// Get the current circuit state, transitioning open -> half-open
    /// once the timeout has elapsed.
    pub fn state(&self) -> CircuitState {
        match self.state.load(Ordering::SeqCst) {
            0 => CircuitState::Closed,
            1 => {
                let opened_at = self.opened_at.load(Ordering::SeqCst);
                let elapsed = now_millis().saturating_sub(opened_at);
                if elapsed >= self.config.timeout.as_millis() as u64 {
                    self.state.store(2, Ordering::SeqCst);
                    self.success_count.store(0, Ordering::SeqCst);
                    CircuitState::HalfOpen
                } else {
                    CircuitState::Open
                }
            }
            _ => CircuitState::HalfOpen,
        }
    }

    /// Run `operation` through the breaker.
    ///
    /// While the circuit is open, `fallback` runs instead and the real
    /// operation is never invoked. Otherwise the operation's outcome
    /// feeds the breaker's counters.
    pub async fn execute<T, FOp, FutOp, FFb, FutFb>(&self, operation: FOp, fallback: FFb) -> Result<T>
    where
        FOp: FnOnce() -> FutOp,
        FutOp: Future<Output = Result<T>>,
        FFb: FnOnce() -> FutFb,
        FutFb: Future<Output = Result<T>>,
    {
        if self.state() == CircuitState::Open {
            return fallback().await;
        }

        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(e)
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let successes = self.success_count.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.config.success_threshold {
                    self.state.store(0, Ordering::SeqCst);
                    self.failure_count.store(0, Ordering::SeqCst);
                    self.success_count.store(0, Ordering::SeqCst);
                    tracing::info!("Circuit breaker closed after recovery");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.state.store(1, Ordering::SeqCst);
                    self.opened_at.store(now_millis(), Ordering::SeqCst);
                    tracing::warn!(
                        "Circuit breaker opened after {} failures",
                        self.config.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open reopens the circuit.
                self.state.store(1, Ordering::SeqCst);
                self.opened_at.store(now_millis(), Ordering::SeqCst);
                self.success_count.store(0, Ordering::SeqCst);
                tracing::warn!("Circuit breaker reopened after failure in half-open state");
            }
            CircuitState::Open => {}
        }
    }

    /// Reset the breaker to closed with cleared counters.
    pub fn reset(&self) {
        self.state.store(0, Ordering::SeqCst);
        self.failure_count.store(0, Ordering::SeqCst);
        self.success_count.store(0, Ordering::SeqCst);
        self.opened_at.store(0, Ordering::SeqCst);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of circuit breakers keyed by integration name.
///
/// Breakers are created lazily and live for the process lifetime. The
/// registry is an injected dependency of the step executor, so tests can
/// run with isolated breaker state.
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config: config,
        }
    }

    /// Get or create the breaker for an integration.
    pub fn get(&self, integration: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().unwrap();
            if let Some(breaker) = breakers.get(integration) {
                return breaker.clone();
            }
        }

        let mut breakers = self.breakers.write().unwrap();
        breakers
            .entry(integration.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::with_config(self.default_config.clone())))
            .clone()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
