//! Email integration handler.
//!
//! Sends transactional mail through an HTTP email provider. Credential
//! fields: `api_key` and `endpoint` (the provider's send URL), plus an
//! optional `from_address` used when the step config omits `from`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::IntegrationHandler;
use crate::error::{Error, Result};
use crate::storage::CredentialRecord;

#[derive(Debug, Deserialize)]
struct EmailConfig {
    to: String,
    subject: String,
    body: String,
    #[serde(default)]
    from: Option<String>,
}

pub struct EmailHandler {
    client: Client,
}

impl EmailHandler {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for EmailHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationHandler for EmailHandler {
    fn integration(&self) -> &str {
        "email"
    }

    fn description(&self) -> &str {
        "Send transactional email"
    }

    async fn execute(&self, config: &Value, credential: &CredentialRecord) -> Result<Value> {
        let config: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::InvalidConfig(format!("email: {}", e)))?;

        let api_key = credential.field("api_key")?;
        let endpoint = credential.field("endpoint")?;
        let from = match &config.from {
            Some(from) => from.as_str(),
            None => credential.field("from_address")?,
        };

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&json!({
                "from": from,
                "to": config.to,
                "subject": config.subject,
                "html": config.body,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::NotConnected("email".into()));
        }
        if !status.is_success() {
            return Err(Error::Transient(format!(
                "Email provider returned {}",
                status
            )));
        }

        let body: Value = response.json().await.unwrap_or_else(|_| json!({}));
        Ok(json!({ "sent": true, "id": body.get("id").cloned() }))
    }
}
