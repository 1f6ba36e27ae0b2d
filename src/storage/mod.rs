//! Storage traits and backends.
//!
//! The engine does not own definition, tenant, or credential storage;
//! those collaborators are modeled as traits so embedders can wire in
//! their own backends. [`MemoryStorage`] implements every trait for
//! embedding and tests; [`SqliteExecutionStore`] is the shipped backend
//! for execution records.

mod memory;
mod models;
mod sqlite;

pub use memory::MemoryStorage;
pub use models::{CredentialRecord, CredentialStatus, Execution, ExecutionStatus};
pub use sqlite::SqliteExecutionStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::workflow::{Plan, Template, WorkflowDefinition};

/// Lookup of workflow definitions by id, scoped to a tenant.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get_workflow(
        &self,
        workflow_id: &str,
        tenant_id: &str,
    ) -> Result<Option<WorkflowDefinition>>;
}

/// Lookup of reusable workflow templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, template_id: &str) -> Result<Option<Template>>;
}

/// Lookup of a tenant's subscription plan.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn get_plan(&self, tenant_id: &str) -> Result<Option<Plan>>;
}

/// Lookup of per-tenant integration credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(
        &self,
        tenant_id: &str,
        integration: &str,
    ) -> Result<Option<CredentialRecord>>;
}

/// Persistence for execution records. `save_execution` is upsert-style:
/// saving an existing id replaces the record.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn save_execution(&self, execution: &Execution) -> Result<()>;
    async fn get_execution(&self, execution_id: &str) -> Result<Option<Execution>>;
}

/// Counter storage for the rate limiter.
///
/// Increments must be atomic at the storage layer: concurrent executions
/// for the same tenant contend on the same key.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Atomically increment the counter for `key` and return the new value.
    async fn increment_and_get(&self, key: &str) -> Result<u64>;
}
