//! Workflow execution orchestrator.
//!
//! Drives a single workflow run end to end: quota admission, definition
//! loading, template validation, then strictly sequential step execution
//! with retries. Every run produces exactly one recorded
//! [`Execution`] whether it completes, fails, or is denied before the
//! first step.
//!
//! Delivery is at-least-once: a retry after a completed-but-unacked call
//! can repeat a side effect. Actions that must not repeat need
//! idempotency on the integration side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::rate_limiter::RateLimiter;
use super::retry::{with_retry, RetryPolicy};
use crate::error::{Error, Result};
use crate::recorder::ExecutionRecorder;
use crate::steps::{StepExecutor, TenantContext};
use crate::storage::{Execution, ExecutionStatus, TemplateStore, TenantStore, WorkflowStore};
use crate::workflow::validate_template_config;

/// Cooperative cancellation flag, checked between steps.
///
/// A step already in flight runs to completion; cancellation never
/// interrupts an external call midway.
#[derive(Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates workflow executions for all tenants.
pub struct Orchestrator {
    workflows: Arc<dyn WorkflowStore>,
    templates: Arc<dyn TemplateStore>,
    tenants: Arc<dyn TenantStore>,
    executor: StepExecutor,
    rate_limiter: RateLimiter,
    recorder: ExecutionRecorder,
    retry_policy: RetryPolicy,
    execution_budget: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        templates: Arc<dyn TemplateStore>,
        tenants: Arc<dyn TenantStore>,
        executor: StepExecutor,
        rate_limiter: RateLimiter,
        recorder: ExecutionRecorder,
    ) -> Self {
        Self {
            workflows,
            templates,
            tenants,
            executor,
            rate_limiter,
            recorder,
            retry_policy: RetryPolicy::default(),
            execution_budget: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Cap the wall-clock time a run may spend. The budget is checked
    /// between steps, like cancellation.
    pub fn with_execution_budget(mut self, budget: Duration) -> Self {
        self.execution_budget = Some(budget);
        self
    }

    /// Run a workflow to completion.
    pub async fn run(&self, workflow_id: &str, tenant_id: &str) -> Result<Execution> {
        self.run_cancellable(workflow_id, tenant_id, &CancelSignal::new())
            .await
    }

    /// Run a workflow, checking `cancel` between steps.
    ///
    /// Returns the completed execution record on success. On failure the
    /// error is returned and the failed record (with results from steps
    /// that did complete) is persisted through the recorder.
    pub async fn run_cancellable(
        &self,
        workflow_id: &str,
        tenant_id: &str,
        cancel: &CancelSignal,
    ) -> Result<Execution> {
        let deadline = self.execution_budget.map(|budget| Instant::now() + budget);
        let mut execution = Execution::new(workflow_id, tenant_id);
        execution.transition(ExecutionStatus::Running);
        info!(
            execution_id = %execution.id,
            workflow_id,
            tenant_id,
            "Starting workflow execution"
        );

        let outcome = self.run_steps(&mut execution, cancel, deadline).await;

        match outcome {
            Ok(()) => {
                execution.transition(ExecutionStatus::Completed);
                info!(
                    execution_id = %execution.id,
                    duration_ms = execution.duration_ms().unwrap_or(0),
                    "Workflow execution completed"
                );
                self.recorder.record(&execution).await;
                Ok(execution)
            }
            Err(e) => {
                execution.transition(ExecutionStatus::Failed);
                execution.error = Some(e.to_string());
                warn!(
                    execution_id = %execution.id,
                    error = %e,
                    "Workflow execution failed"
                );
                self.recorder.record(&execution).await;
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        execution: &mut Execution,
        cancel: &CancelSignal,
        deadline: Option<Instant>,
    ) -> Result<()> {
        let tenant_id = execution.tenant_id.clone();
        let workflow_id = execution.workflow_id.clone();

        let plan = self
            .tenants
            .get_plan(&tenant_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("tenant '{}'", tenant_id)))?;

        // Quota admission happens before any step runs, so a denied run
        // performs zero external calls.
        let quota = plan.monthly_quota();
        let decision = self.rate_limiter.check_limit(&tenant_id, quota).await;
        if !decision.allowed {
            return Err(Error::QuotaExceeded { plan, limit: quota });
        }

        let workflow = self
            .workflows
            .get_workflow(&workflow_id, &tenant_id)
            .await?
            .ok_or_else(|| Error::WorkflowNotFound(workflow_id.clone()))?;
        if !workflow.enabled {
            return Err(Error::WorkflowDisabled(workflow_id.clone()));
        }

        if let Some(template_id) = &workflow.template_id {
            let template = self
                .templates
                .get_template(template_id)
                .await?
                .ok_or_else(|| Error::InvalidConfig(format!("Template '{}' not found", template_id)))?;
            validate_template_config(&template, &workflow)?;
        }

        let tenant = TenantContext {
            tenant_id: tenant_id.clone(),
            plan,
        };

        for step in &workflow.steps {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled(format!("before step '{}'", step.id)));
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout(format!(
                        "execution budget exhausted before step '{}'",
                        step.id
                    )));
                }
            }

            debug!(step_id = %step.id, kind = %step.kind, "Executing step");
            let value = with_retry(&self.retry_policy, |_| {
                self.executor.execute_step(step, &tenant, &execution.results)
            })
            .await
            .map_err(|e| Error::for_step(&step.id, e))?;

            execution.results.insert(step.id.clone(), value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::engine::circuit_breaker::BreakerRegistry;
    use crate::engine::rate_limiter::month_key;
    use crate::recorder::ExecutionRecorder;
    use crate::steps::{IntegrationHandler, IntegrationRegistry};
    use crate::storage::{CredentialRecord, ExecutionStore, MemoryStorage};
    use crate::telemetry::MemorySink;
    use crate::workflow::{Plan, Step, StepKind, Template, TemplateStep, WorkflowDefinition};
    use chrono::Utc;

    struct FakeHandler {
        name: &'static str,
        calls: Arc<AtomicU32>,
        configs: Arc<Mutex<Vec<Value>>>,
        response: Value,
        fail_with: Option<fn() -> Error>,
        cancel_after: Option<CancelSignal>,
    }

    impl FakeHandler {
        fn new(name: &'static str, response: Value) -> Self {
            Self {
                name,
                calls: Arc::new(AtomicU32::new(0)),
                configs: Arc::new(Mutex::new(Vec::new())),
                response,
                fail_with: None,
                cancel_after: None,
            }
        }

        fn failing(name: &'static str, fail_with: fn() -> Error) -> Self {
            let mut handler = Self::new(name, Value::Null);
            handler.fail_with = Some(fail_with);
            handler
        }
    }

    #[async_trait]
    impl IntegrationHandler for FakeHandler {
        fn integration(&self) -> &str {
            self.name
        }

        async fn execute(&self, config: &Value, _credential: &CredentialRecord) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.configs.lock().unwrap().push(config.clone());
            if let Some(cancel) = &self.cancel_after {
                cancel.cancel();
            }
            match self.fail_with {
                Some(make_error) => Err(make_error()),
                None => Ok(self.response.clone()),
            }
        }
    }

    struct Fixture {
        storage: Arc<MemoryStorage>,
        sink: Arc<MemorySink>,
        registry: IntegrationRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let storage = Arc::new(MemoryStorage::new());
            storage.insert_plan("acme", Plan::Free);
            Self {
                storage,
                sink: Arc::new(MemorySink::new()),
                registry: IntegrationRegistry::empty(),
            }
        }

        fn add_handler(&mut self, handler: FakeHandler) -> (Arc<AtomicU32>, Arc<Mutex<Vec<Value>>>) {
            let calls = handler.calls.clone();
            let configs = handler.configs.clone();
            self.storage.insert_credential(
                "acme",
                CredentialRecord::connected(handler.name, &[("token", "secret")]),
            );
            self.registry.register(Arc::new(handler));
            (calls, configs)
        }

        fn orchestrator(self) -> Orchestrator {
            let executor = StepExecutor::new(
                self.registry,
                Arc::new(BreakerRegistry::new()),
                self.storage.clone(),
            );
            Orchestrator::new(
                self.storage.clone(),
                self.storage.clone(),
                self.storage.clone(),
                executor,
                RateLimiter::new(self.storage.clone()),
                ExecutionRecorder::new(self.storage.clone(), self.sink.clone()),
            )
            .with_retry_policy(RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
                delay_cap: Duration::from_millis(1),
            })
        }
    }

    fn action(id: &str, integration: &str, config: Value) -> Step {
        Step {
            id: id.into(),
            kind: StepKind::Action,
            integration: Some(integration.into()),
            config,
        }
    }

    fn digest_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            id: "order-digest".into(),
            tenant_id: "acme".into(),
            enabled: true,
            template_id: None,
            steps: vec![
                Step {
                    id: "daily".into(),
                    kind: StepKind::Trigger,
                    integration: None,
                    config: json!({}),
                },
                action("fetch-orders", "shopify", json!({"operation": "get_orders"})),
                action(
                    "notify",
                    "slack",
                    json!({"message": "Orders today: {{fetch-orders.count}}"}),
                ),
            ],
        }
    }

    #[tokio::test]
    async fn runs_steps_in_order_and_resolves_placeholders() {
        let mut fx = Fixture::new();
        let (shopify_calls, _) = fx.add_handler(FakeHandler::new("shopify", json!({"count": 7})));
        let (slack_calls, slack_configs) = fx.add_handler(FakeHandler::new("slack", json!({"ok": true})));
        let storage = fx.storage.clone();
        let sink = fx.sink.clone();
        storage.insert_workflow(digest_workflow());

        let execution = fx.orchestrator().run("order-digest", "acme").await.unwrap();

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(shopify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(slack_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            slack_configs.lock().unwrap()[0]["message"],
            "Orders today: 7"
        );
        assert_eq!(execution.results["fetch-orders"]["count"], 7);

        // One record persisted, one telemetry event emitted.
        let saved = storage.get_execution(&execution.id).await.unwrap().unwrap();
        assert_eq!(saved.status, ExecutionStatus::Completed);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].meta["status"], "completed");
    }

    #[tokio::test]
    async fn quota_denied_runs_no_steps() {
        let mut fx = Fixture::new();
        let (calls, _) = fx.add_handler(FakeHandler::new("shopify", json!({"count": 0})));
        let storage = fx.storage.clone();
        storage.insert_workflow(digest_workflow());
        storage.set_counter(&month_key("acme", Utc::now()), Plan::Free.monthly_quota());

        let err = fx.orchestrator().run("order-digest", "acme").await.unwrap_err();

        assert!(matches!(err, Error::QuotaExceeded { plan: Plan::Free, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disabled_workflow_is_rejected() {
        let fx = Fixture::new();
        let storage = fx.storage.clone();
        let mut workflow = digest_workflow();
        workflow.enabled = false;
        storage.insert_workflow(workflow);

        let err = fx.orchestrator().run("order-digest", "acme").await.unwrap_err();
        assert!(matches!(err, Error::WorkflowDisabled(_)));
    }

    #[tokio::test]
    async fn unknown_workflow_is_rejected() {
        let fx = Fixture::new();
        let err = fx.orchestrator().run("nope", "acme").await.unwrap_err();
        assert!(matches!(err, Error::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn workflow_is_scoped_to_tenant() {
        let fx = Fixture::new();
        let storage = fx.storage.clone();
        storage.insert_plan("rival", Plan::Free);
        storage.insert_workflow(digest_workflow());

        let err = fx.orchestrator().run("order-digest", "rival").await.unwrap_err();
        assert!(matches!(err, Error::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn template_validation_reports_all_missing_fields() {
        let mut fx = Fixture::new();
        let (calls, _) = fx.add_handler(FakeHandler::new("shopify", json!({})));
        let storage = fx.storage.clone();

        storage.insert_template(Template {
            id: "digest".into(),
            steps: vec![TemplateStep {
                id: "fetch-orders".into(),
                required_fields: vec!["operation".into(), "status".into()],
            }],
        });
        let mut workflow = digest_workflow();
        workflow.template_id = Some("digest".into());
        workflow.steps[1].config = json!({});
        storage.insert_workflow(workflow);

        let err = fx.orchestrator().run("order-digest", "acme").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("fetch-orders.operation"), "{message}");
        assert!(message.contains("fetch-orders.status"), "{message}");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn step_failure_fails_run_and_keeps_prior_results() {
        let mut fx = Fixture::new();
        fx.add_handler(FakeHandler::new("shopify", json!({"count": 3})));
        let (slack_calls, _) = fx.add_handler(FakeHandler::failing("slack", || {
            Error::InvalidConfig("channel is required".into())
        }));
        let storage = fx.storage.clone();
        let sink = fx.sink.clone();
        storage.insert_workflow(digest_workflow());

        let err = fx.orchestrator().run("order-digest", "acme").await.unwrap_err();

        assert!(matches!(err, Error::Step { ref step_id, .. } if step_id == "notify"));
        // Terminal config error: no retry.
        assert_eq!(slack_calls.load(Ordering::SeqCst), 1);

        // The failed record keeps the successful step's output.
        let events = sink.events();
        assert_eq!(events[0].meta["status"], "failed");
        let saved = find_saved(&storage).await;
        assert_eq!(saved.results["fetch-orders"]["count"], 3);
        assert_eq!(
            saved.error.as_deref(),
            Some("Step notify failed: Invalid configuration: channel is required")
        );
    }

    #[tokio::test]
    async fn transient_step_failure_is_retried() {
        let mut fx = Fixture::new();
        let (_, _) = fx.add_handler(FakeHandler::new("shopify", json!({"count": 1})));
        let (slack_calls, _) = fx.add_handler(FakeHandler::failing("slack", || {
            Error::Transient("502 from gateway".into())
        }));
        let storage = fx.storage.clone();
        storage.insert_workflow(digest_workflow());

        let err = fx.orchestrator().run("order-digest", "acme").await.unwrap_err();
        assert!(matches!(err, Error::Step { .. }));
        // max_attempts is 2 in the fixture policy.
        assert_eq!(slack_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_between_steps() {
        let mut fx = Fixture::new();
        let cancel = CancelSignal::new();
        let mut first = FakeHandler::new("shopify", json!({"count": 1}));
        first.cancel_after = Some(cancel.clone());
        fx.add_handler(first);
        let (slack_calls, _) = fx.add_handler(FakeHandler::new("slack", json!({"ok": true})));
        let storage = fx.storage.clone();
        storage.insert_workflow(digest_workflow());

        let err = fx
            .orchestrator()
            .run_cancellable("order-digest", "acme", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert_eq!(slack_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tenant_is_rejected() {
        let fx = Fixture::new();
        let err = fx.orchestrator().run("order-digest", "ghost").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    // Execution ids are fresh uuids; the store holds exactly one record here.
    async fn find_saved(storage: &MemoryStorage) -> Execution {
        storage.executions_snapshot().into_iter().next().unwrap()
    }
}
