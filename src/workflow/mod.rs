//! Workflow definitions and validation.

mod types;
mod validator;

pub use types::{Plan, Step, StepKind, StepResults, Template, TemplateStep, WorkflowDefinition};
pub use validator::{validate_template_config, validate_workflow};

use crate::error::Result;

/// Parse a workflow definition from YAML and validate its structure.
pub fn parse_workflow(yaml: &str) -> Result<WorkflowDefinition> {
    let workflow: WorkflowDefinition = serde_yaml::from_str(yaml)?;
    validate_workflow(&workflow)?;
    Ok(workflow)
}
