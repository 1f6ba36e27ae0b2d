//! Error types for autom8.
//!
//! Step failures carry a typed variant rather than a message pattern, so
//! the retry controller's classification is exhaustive: adding a variant
//! forces a decision in [`Error::is_retryable`].

use thiserror::Error;

use crate::workflow::Plan;

/// Result type alias for autom8 operations.
pub type Result<T> = std::result::Result<T, Error>;

/// autom8 error types.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Monthly automation limit reached ({limit} runs on the {plan} plan). Upgrade your plan to run more automations.")]
    QuotaExceeded { plan: Plan, limit: u64 },

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Workflow is disabled: {0}")]
    WorkflowDisabled(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Integration '{0}' is not connected. Reconnect it from the integrations page.")]
    NotConnected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported integration: {0}")]
    UnsupportedIntegration(String),

    #[error("Integration '{0}' is temporarily unavailable, please try again later")]
    CircuitOpen(String),

    #[error("Step {step_id} failed: {source}")]
    Step {
        step_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Execution cancelled: {0}")]
    Cancelled(String),

    #[error("Execution timed out: {0}")]
    Timeout(String),

    #[error("Transient integration failure: {0}")]
    Transient(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the retry controller should attempt this failure again.
    ///
    /// Terminal errors (quota, configuration, disconnected credentials,
    /// open circuits) re-throw immediately without consuming attempts.
    /// Only failures that plausibly resolve on their own are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transient(_) | Error::Http(_) | Error::Storage(_) => true,

            Error::QuotaExceeded { .. }
            | Error::WorkflowNotFound(_)
            | Error::WorkflowDisabled(_)
            | Error::InvalidConfig(_)
            | Error::NotConnected(_)
            | Error::NotFound(_)
            | Error::UnsupportedIntegration(_)
            | Error::CircuitOpen(_)
            | Error::Step { .. }
            | Error::Cancelled(_)
            | Error::Timeout(_)
            | Error::Validation(_)
            | Error::Json(_)
            | Error::Yaml(_) => false,
        }
    }

    /// Wrap a step-level failure with the originating step id.
    pub fn for_step(step_id: &str, source: Error) -> Self {
        Error::Step {
            step_id: step_id.to_string(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        assert!(Error::Transient("503 from upstream".into()).is_retryable());
        assert!(Error::Storage("connection reset".into()).is_retryable());
    }

    #[test]
    fn terminal_failures_are_not_retryable() {
        assert!(!Error::NotConnected("shopify".into()).is_retryable());
        assert!(!Error::NotFound("order 42".into()).is_retryable());
        assert!(!Error::InvalidConfig("missing field".into()).is_retryable());
        assert!(!Error::CircuitOpen("xero".into()).is_retryable());
        assert!(!Error::QuotaExceeded {
            plan: Plan::Free,
            limit: 100
        }
        .is_retryable());
    }

    #[test]
    fn step_wrapper_includes_step_id_and_cause() {
        let err = Error::for_step("notify", Error::NotConnected("slack".into()));
        let msg = err.to_string();
        assert!(msg.starts_with("Step notify failed:"));
        assert!(msg.contains("slack"));
    }
}
