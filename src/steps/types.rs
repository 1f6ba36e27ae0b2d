//! Step execution types.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::storage::CredentialRecord;
use crate::workflow::Plan;

/// Tenant identity resolved once per run and passed to every step.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: String,
    pub plan: Plan,
}

/// A pluggable integration backing action steps.
///
/// Handlers receive fully resolved configuration (placeholders already
/// substituted) and a connected credential; they never see prior step
/// results or tenant plumbing directly.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    /// Integration name action steps refer to (e.g. `"shopify"`).
    fn integration(&self) -> &str;

    /// Execute the action and return its JSON output.
    async fn execute(&self, config: &Value, credential: &CredentialRecord) -> Result<Value>;

    /// Human-readable description for listings.
    fn description(&self) -> &str {
        ""
    }
}
