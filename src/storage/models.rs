//! Storage models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::workflow::StepResults;

/// Execution status.
///
/// The lifecycle only moves forward: pending -> running -> completed or
/// failed. Terminal states absorb; further transitions are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// One concrete run of a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub tenant_id: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Raw step results keyed by step id.
    pub results: StepResults,
}

impl Execution {
    /// Create a pending execution for a run that is about to start.
    pub fn new(workflow_id: &str, tenant_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            tenant_id: tenant_id.to_string(),
            status: ExecutionStatus::Pending,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
            results: StepResults::new(),
        }
    }

    /// Attempt a status transition. Returns false (and leaves the record
    /// unchanged) if the transition would move backwards or re-enter a
    /// terminal state.
    pub fn transition(&mut self, next: ExecutionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }

    /// Execution duration in milliseconds, if terminal.
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds())
    }
}

/// Connection status of a stored integration credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Connected,
    Revoked,
    Expired,
}

/// Stored credential record for (tenant, integration).
///
/// Only `connected` records are usable by the step executor; anything
/// else is treated as not connected and requires the user to reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub integration: String,
    pub status: CredentialStatus,
    /// Integration-specific fields (tokens, shop domains, endpoints).
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl CredentialRecord {
    /// Build a connected credential from field pairs.
    pub fn connected(integration: &str, fields: &[(&str, &str)]) -> Self {
        Self {
            integration: integration.to_string(),
            status: CredentialStatus::Connected,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == CredentialStatus::Connected
    }

    /// Fetch a required field, as a step-level configuration error if absent.
    pub fn field(&self, name: &str) -> crate::error::Result<&str> {
        self.fields.get(name).map(|s| s.as_str()).ok_or_else(|| {
            crate::error::Error::InvalidConfig(format!(
                "Credential for '{}' is missing field '{}'",
                self.integration, name
            ))
        })
    }
}
