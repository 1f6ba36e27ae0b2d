//! Step executor.
//!
//! Executes a single step of a workflow. Triggers acknowledge, condition
//! steps evaluate an operator over resolved values, and action steps
//! dispatch to a registered [`IntegrationHandler`] behind that
//! integration's circuit breaker.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::{json, Value};

use super::registry::IntegrationRegistry;
use super::types::TenantContext;
use crate::engine::circuit_breaker::BreakerRegistry;
use crate::error::{Error, Result};
use crate::storage::CredentialStore;
use crate::template;
use crate::workflow::{Step, StepKind, StepResults};

/// Executes individual workflow steps.
pub struct StepExecutor {
    registry: IntegrationRegistry,
    breakers: Arc<BreakerRegistry>,
    credentials: Arc<dyn CredentialStore>,
}

impl StepExecutor {
    pub fn new(
        registry: IntegrationRegistry,
        breakers: Arc<BreakerRegistry>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            registry,
            breakers,
            credentials,
        }
    }

    /// Execute one step against the results accumulated so far.
    pub async fn execute_step(
        &self,
        step: &Step,
        tenant: &TenantContext,
        prior_results: &StepResults,
    ) -> Result<Value> {
        match step.kind {
            StepKind::Trigger => Ok(json!({ "triggered": true })),
            StepKind::Condition => evaluate_condition(&step.config, prior_results),
            StepKind::Action => self.execute_action(step, tenant, prior_results).await,
        }
    }

    async fn execute_action(
        &self,
        step: &Step,
        tenant: &TenantContext,
        prior_results: &StepResults,
    ) -> Result<Value> {
        let integration = step
            .integration
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("Action step '{}' has no integration", step.id))
            })?;

        let handler = self
            .registry
            .get(integration)
            .ok_or_else(|| Error::UnsupportedIntegration(integration.to_string()))?;

        let credential = self
            .credentials
            .get_credential(&tenant.tenant_id, integration)
            .await?
            .filter(|credential| credential.is_connected())
            .ok_or_else(|| Error::NotConnected(integration.to_string()))?;

        let config = template::resolve_value(&step.config, prior_results);

        let breaker = self.breakers.get(integration);
        let name = integration.to_string();
        breaker
            .execute(
                || handler.execute(&config, &credential),
                || async move { Err(Error::CircuitOpen(name)) },
            )
            .await
    }
}

/// Evaluate a condition step's config to a boolean result.
///
/// Config shape: `{ field, operator, value }` where operator is one of
/// `equals`, `contains`, `greater_than`, `less_than`. Comparisons are
/// numeric when both sides parse as numbers, textual otherwise.
fn evaluate_condition(config: &Value, prior_results: &StepResults) -> Result<Value> {
    let resolved = template::resolve_value(config, prior_results);

    let field = resolved.get("field").cloned().unwrap_or(Value::Null);
    let operator = resolved
        .get("operator")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::InvalidConfig("Condition step requires an 'operator'".into()))?;
    let expected = resolved.get("value").cloned().unwrap_or(Value::Null);

    let matched = match operator {
        "equals" => values_equal(&field, &expected),
        "contains" => contains(&field, &expected),
        "greater_than" => compare(&field, &expected) == Some(Ordering::Greater),
        "less_than" => compare(&field, &expected) == Some(Ordering::Less),
        other => {
            return Err(Error::InvalidConfig(format!(
                "Unknown condition operator: {}",
                other
            )))
        }
    };

    Ok(Value::Bool(matched))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x == y;
    }
    as_text(a) == as_text(b)
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| values_equal(item, needle)),
        _ => as_text(haystack).contains(&as_text(needle)),
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    let x = as_number(a)?;
    let y = as_number(b)?;
    x.partial_cmp(&y)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    use async_trait::async_trait;

    use super::*;
    use crate::engine::circuit_breaker::CircuitBreakerConfig;
    use crate::steps::IntegrationHandler;
    use crate::storage::{CredentialRecord, CredentialStatus, MemoryStorage};
    use crate::workflow::Plan;

    struct EchoHandler {
        calls: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait]
    impl IntegrationHandler for EchoHandler {
        fn integration(&self) -> &str {
            "echo"
        }

        async fn execute(&self, config: &Value, _credential: &CredentialRecord) -> Result<Value> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if self.fail {
                Err(Error::Transient("echo down".into()))
            } else {
                Ok(config.clone())
            }
        }
    }

    fn tenant() -> TenantContext {
        TenantContext {
            tenant_id: "acme".into(),
            plan: Plan::Free,
        }
    }

    fn action_step(config: Value) -> Step {
        Step {
            id: "do-echo".into(),
            kind: StepKind::Action,
            integration: Some("echo".into()),
            config,
        }
    }

    fn executor_with(handler: EchoHandler, storage: Arc<MemoryStorage>) -> StepExecutor {
        let mut registry = IntegrationRegistry::empty();
        registry.register(Arc::new(handler));
        let breakers = Arc::new(BreakerRegistry::with_config(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            timeout: std::time::Duration::from_secs(60),
        }));
        StepExecutor::new(registry, breakers, storage)
    }

    #[tokio::test]
    async fn trigger_steps_acknowledge() {
        let executor = executor_with(
            EchoHandler {
                calls: Arc::new(AtomicU32::new(0)),
                fail: false,
            },
            Arc::new(MemoryStorage::new()),
        );
        let step = Step {
            id: "daily".into(),
            kind: StepKind::Trigger,
            integration: None,
            config: json!({}),
        };

        let result = executor
            .execute_step(&step, &tenant(), &StepResults::new())
            .await
            .unwrap();
        assert_eq!(result, json!({ "triggered": true }));
    }

    #[tokio::test]
    async fn action_resolves_config_before_dispatch() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_credential("acme", CredentialRecord::connected("echo", &[]));
        let executor = executor_with(
            EchoHandler {
                calls: Arc::new(AtomicU32::new(0)),
                fail: false,
            },
            storage,
        );

        let mut prior = StepResults::new();
        prior.insert("fetch".into(), json!({"count": 7}));
        let step = action_step(json!({"message": "Orders: {{fetch.count}}"}));

        let result = executor
            .execute_step(&step, &tenant(), &prior)
            .await
            .unwrap();
        assert_eq!(result["message"], "Orders: 7");
    }

    #[tokio::test]
    async fn unregistered_integration_is_rejected() {
        let executor = StepExecutor::new(
            IntegrationRegistry::empty(),
            Arc::new(BreakerRegistry::new()),
            Arc::new(MemoryStorage::new()),
        );
        let step = action_step(json!({}));

        let err = executor
            .execute_step(&step, &tenant(), &StepResults::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedIntegration(_)));
    }

    #[tokio::test]
    async fn disconnected_credential_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let mut credential = CredentialRecord::connected("echo", &[]);
        credential.status = CredentialStatus::Expired;
        storage.insert_credential("acme", credential);

        let executor = executor_with(
            EchoHandler {
                calls: Arc::new(AtomicU32::new(0)),
                fail: false,
            },
            storage,
        );

        let err = executor
            .execute_step(&action_step(json!({})), &tenant(), &StepResults::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected(_)));
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_handler() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_credential("acme", CredentialRecord::connected("echo", &[]));
        let calls = Arc::new(AtomicU32::new(0));
        let executor = executor_with(
            EchoHandler {
                calls: calls.clone(),
                fail: true,
            },
            storage,
        );
        let step = action_step(json!({}));

        // First failure opens the breaker (threshold 1 in this fixture).
        let err = executor
            .execute_step(&step, &tenant(), &StepResults::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        // Second call never reaches the handler.
        let err = executor
            .execute_step(&step, &tenant(), &StepResults::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CircuitOpen(_)));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn condition_operators() {
        let prior = StepResults::new();
        let eval = |config: Value| evaluate_condition(&config, &prior).unwrap();

        assert_eq!(
            eval(json!({"field": 7, "operator": "equals", "value": 7})),
            json!(true)
        );
        assert_eq!(
            eval(json!({"field": "7", "operator": "equals", "value": 7})),
            json!(true)
        );
        assert_eq!(
            eval(json!({"field": "hello world", "operator": "contains", "value": "world"})),
            json!(true)
        );
        assert_eq!(
            eval(json!({"field": [1, 2, 3], "operator": "contains", "value": 2})),
            json!(true)
        );
        assert_eq!(
            eval(json!({"field": 10, "operator": "greater_than", "value": 5})),
            json!(true)
        );
        assert_eq!(
            eval(json!({"field": 10, "operator": "less_than", "value": 5})),
            json!(false)
        );
        // Non-numeric operands never satisfy an ordering comparison.
        assert_eq!(
            eval(json!({"field": "abc", "operator": "greater_than", "value": 5})),
            json!(false)
        );
    }

    #[test]
    fn condition_resolves_placeholders_from_prior_steps() {
        let mut prior = StepResults::new();
        prior.insert("fetch".into(), json!({"count": 12}));

        let result = evaluate_condition(
            &json!({"field": "{{fetch.count}}", "operator": "greater_than", "value": 10}),
            &prior,
        )
        .unwrap();
        assert_eq!(result, json!(true));
    }

    #[test]
    fn unknown_operator_is_config_error() {
        let err =
            evaluate_condition(&json!({"field": 1, "operator": "matches", "value": 1}), &StepResults::new())
                .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn missing_operator_is_config_error() {
        let err = evaluate_condition(&json!({"field": 1}), &StepResults::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
