//! Xero integration handler.
//!
//! Creates invoices through the Xero accounting API. Credential fields:
//! `access_token` and `xero_tenant_id` (Xero's own tenant header, not
//! ours).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::IntegrationHandler;
use crate::error::{Error, Result};
use crate::storage::CredentialRecord;

#[derive(Debug, Deserialize)]
struct XeroConfig {
    operation: String,
    #[serde(default)]
    contact: Option<String>,
    #[serde(default)]
    line_items: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
struct LineItem {
    description: String,
    quantity: f64,
    unit_amount: f64,
}

pub struct XeroHandler {
    client: Client,
}

impl XeroHandler {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn create_invoice(&self, config: &XeroConfig, credential: &CredentialRecord) -> Result<Value> {
        let contact = config.contact.as_deref().ok_or_else(|| {
            Error::InvalidConfig("xero: 'contact' is required for create_invoice".into())
        })?;
        if config.line_items.is_empty() {
            return Err(Error::InvalidConfig(
                "xero: create_invoice needs at least one line item".into(),
            ));
        }

        let access_token = credential.field("access_token")?;
        let xero_tenant = credential.field("xero_tenant_id")?;

        let line_items: Vec<Value> = config
            .line_items
            .iter()
            .map(|item| {
                json!({
                    "Description": item.description,
                    "Quantity": item.quantity,
                    "UnitAmount": item.unit_amount,
                })
            })
            .collect();

        let response = self
            .client
            .post("https://api.xero.com/api.xro/2.0/Invoices")
            .bearer_auth(access_token)
            .header("Xero-Tenant-Id", xero_tenant)
            .header("Accept", "application/json")
            .json(&json!({
                "Type": "ACCREC",
                "Contact": { "Name": contact },
                "LineItems": line_items,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::NotConnected("xero".into()));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("Xero contact '{}'", contact)));
        }
        if !status.is_success() {
            return Err(Error::Transient(format!("Xero API returned {}", status)));
        }

        let body: Value = response.json().await?;
        let invoice = body
            .get("Invoices")
            .and_then(|v| v.as_array())
            .and_then(|invoices| invoices.first())
            .cloned()
            .unwrap_or(Value::Null);
        Ok(json!({ "invoice": invoice }))
    }
}

impl Default for XeroHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationHandler for XeroHandler {
    fn integration(&self) -> &str {
        "xero"
    }

    fn description(&self) -> &str {
        "Create invoices in Xero"
    }

    async fn execute(&self, config: &Value, credential: &CredentialRecord) -> Result<Value> {
        let config: XeroConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::InvalidConfig(format!("xero: {}", e)))?;

        match config.operation.as_str() {
            "create_invoice" => self.create_invoice(&config, credential).await,
            other => Err(Error::InvalidConfig(format!(
                "Unknown xero operation: {}",
                other
            ))),
        }
    }
}
