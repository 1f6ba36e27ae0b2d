//! In-memory storage backend.
//!
//! Implements every storage trait over locked maps. Used by tests and by
//! embedders that manage definitions themselves.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::models::{CredentialRecord, Execution};
use super::{
    CredentialStore, ExecutionStore, QuotaStore, TemplateStore, TenantStore, WorkflowStore,
};
use crate::error::Result;
use crate::workflow::{Plan, Template, WorkflowDefinition};

/// In-memory implementation of all storage traits.
#[derive(Default)]
pub struct MemoryStorage {
    workflows: Mutex<HashMap<(String, String), WorkflowDefinition>>,
    templates: Mutex<HashMap<String, Template>>,
    plans: Mutex<HashMap<String, Plan>>,
    credentials: Mutex<HashMap<(String, String), CredentialRecord>>,
    executions: Mutex<HashMap<String, Execution>>,
    counters: Mutex<HashMap<String, u64>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_workflow(&self, workflow: WorkflowDefinition) {
        self.workflows.lock().unwrap().insert(
            (workflow.id.clone(), workflow.tenant_id.clone()),
            workflow,
        );
    }

    pub fn insert_template(&self, template: Template) {
        self.templates
            .lock()
            .unwrap()
            .insert(template.id.clone(), template);
    }

    pub fn insert_plan(&self, tenant_id: &str, plan: Plan) {
        self.plans.lock().unwrap().insert(tenant_id.to_string(), plan);
    }

    pub fn insert_credential(&self, tenant_id: &str, credential: CredentialRecord) {
        self.credentials.lock().unwrap().insert(
            (tenant_id.to_string(), credential.integration.clone()),
            credential,
        );
    }

    /// Pre-seed a quota counter (e.g. prior runs this month).
    pub fn set_counter(&self, key: &str, value: u64) {
        self.counters.lock().unwrap().insert(key.to_string(), value);
    }

    #[cfg(test)]
    pub(crate) fn executions_snapshot(&self) -> Vec<Execution> {
        self.executions.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStorage {
    async fn get_workflow(
        &self,
        workflow_id: &str,
        tenant_id: &str,
    ) -> Result<Option<WorkflowDefinition>> {
        Ok(self
            .workflows
            .lock()
            .unwrap()
            .get(&(workflow_id.to_string(), tenant_id.to_string()))
            .cloned())
    }
}

#[async_trait]
impl TemplateStore for MemoryStorage {
    async fn get_template(&self, template_id: &str) -> Result<Option<Template>> {
        Ok(self.templates.lock().unwrap().get(template_id).cloned())
    }
}

#[async_trait]
impl TenantStore for MemoryStorage {
    async fn get_plan(&self, tenant_id: &str) -> Result<Option<Plan>> {
        Ok(self.plans.lock().unwrap().get(tenant_id).copied())
    }
}

#[async_trait]
impl CredentialStore for MemoryStorage {
    async fn get_credential(
        &self,
        tenant_id: &str,
        integration: &str,
    ) -> Result<Option<CredentialRecord>> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .get(&(tenant_id.to_string(), integration.to_string()))
            .cloned())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStorage {
    async fn save_execution(&self, execution: &Execution) -> Result<()> {
        self.executions
            .lock()
            .unwrap()
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    async fn get_execution(&self, execution_id: &str) -> Result<Option<Execution>> {
        Ok(self.executions.lock().unwrap().get(execution_id).cloned())
    }
}

#[async_trait]
impl QuotaStore for MemoryStorage {
    async fn increment_and_get(&self, key: &str) -> Result<u64> {
        let mut counters = self.counters.lock().unwrap();
        let counter = counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
