//! Workflow definition types.
//!
//! Definitions are authored by the design-time editor and loaded
//! read-only at execution time. Step order is significant: array order is
//! execution order, and a later step's config may reference an earlier
//! step's result through `{{step-id.path}}` placeholders.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Entry point; evaluated by the caller before the run starts.
    Trigger,
    /// Outbound call against a third-party integration.
    Action,
    /// Boolean check over a resolved field.
    Condition,
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trigger => write!(f, "trigger"),
            Self::Action => write!(f, "action"),
            Self::Condition => write!(f, "condition"),
        }
    }
}

/// One unit of work in a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique step id within the workflow.
    pub id: String,

    /// What this step does.
    pub kind: StepKind,

    /// Target integration name (required for action steps).
    #[serde(default)]
    pub integration: Option<String>,

    /// Arbitrary key/value configuration. String values may contain
    /// `{{...}}` placeholders resolved against prior step results.
    #[serde(default = "empty_config")]
    pub config: Value,
}

fn empty_config() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique workflow id.
    pub id: String,

    /// Owning tenant.
    pub tenant_id: String,

    /// Disabled workflows must never start an execution.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Optional reference to a reusable template shape.
    #[serde(default)]
    pub template_id: Option<String>,

    /// Ordered steps. Array order is execution order.
    pub steps: Vec<Step>,
}

fn default_enabled() -> bool {
    true
}

impl WorkflowDefinition {
    /// Find a step by id.
    pub fn get_step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}

/// Required-field rules for one step of a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStep {
    /// Step id this rule applies to.
    pub id: String,

    /// Config keys that must be present and non-null on the step.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// A reusable workflow shape with declared required fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub steps: Vec<TemplateStep>,
}

/// Subscription plan for a tenant, mapping to a monthly automation quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Starter,
    Pro,
}

impl Plan {
    /// Monthly automation run quota for this plan.
    pub fn monthly_quota(&self) -> u64 {
        match self {
            Plan::Free => 100,
            Plan::Starter => 10_000,
            Plan::Pro => 50_000,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Plan::Free => write!(f, "free"),
            Plan::Starter => write!(f, "starter"),
            Plan::Pro => write!(f, "pro"),
        }
    }
}

/// Per-step results accumulated during a run, keyed by step id.
pub type StepResults = HashMap<String, Value>;
