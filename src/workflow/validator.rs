//! Workflow definition validation.

use std::collections::HashSet;

use super::types::{StepKind, Template, WorkflowDefinition};
use crate::error::{Error, Result};

/// Validate the structure of a workflow definition.
///
/// Checks for:
/// - Non-empty workflow and tenant ids
/// - At least one step
/// - Unique step ids
/// - Action steps naming a target integration
pub fn validate_workflow(workflow: &WorkflowDefinition) -> Result<()> {
    if workflow.id.is_empty() {
        return Err(Error::Validation("Workflow id is required".into()));
    }

    if workflow.tenant_id.is_empty() {
        return Err(Error::Validation("Workflow tenant_id is required".into()));
    }

    if workflow.steps.is_empty() {
        return Err(Error::Validation(
            "Workflow must have at least one step".into(),
        ));
    }

    let mut ids = HashSet::new();
    for step in &workflow.steps {
        if step.id.is_empty() {
            return Err(Error::Validation("Step id cannot be empty".into()));
        }
        if !ids.insert(&step.id) {
            return Err(Error::Validation(format!("Duplicate step id: {}", step.id)));
        }

        if step.kind == StepKind::Action && step.integration.as_deref().unwrap_or("").is_empty() {
            return Err(Error::Validation(format!(
                "Action step '{}' must name an integration",
                step.id
            )));
        }
    }

    Ok(())
}

/// Validate stored per-step config against a template's required fields.
///
/// Every missing field is collected as `step_id.field` and reported in a
/// single error, so a misconfigured workflow surfaces the full list at
/// once instead of failing one field at a time.
pub fn validate_template_config(template: &Template, workflow: &WorkflowDefinition) -> Result<()> {
    let mut missing = Vec::new();

    for rule in &template.steps {
        let config = workflow.get_step(&rule.id).map(|step| &step.config);

        for field in &rule.required_fields {
            let present = config
                .and_then(|c| c.as_object())
                .and_then(|obj| obj.get(field))
                .map(|v| !v.is_null())
                .unwrap_or(false);

            if !present {
                missing.push(format!("{}.{}", rule.id, field));
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}
