//! Slack integration handler.
//!
//! Posts messages either through an incoming webhook (`webhook_url`
//! credential field) or the Web API (`bot_token` field). When both are
//! present the bot token wins, since it supports channel targeting.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::IntegrationHandler;
use crate::error::{Error, Result};
use crate::storage::CredentialRecord;

#[derive(Debug, Deserialize)]
struct SlackConfig {
    #[serde(alias = "text")]
    message: String,
    #[serde(default)]
    channel: Option<String>,
}

pub struct SlackHandler {
    client: Client,
}

impl SlackHandler {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn post_via_api(&self, token: &str, config: &SlackConfig) -> Result<Value> {
        let channel = config.channel.as_deref().ok_or_else(|| {
            Error::InvalidConfig("slack: 'channel' is required with a bot token".into())
        })?;

        let response = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(token)
            .json(&json!({ "channel": channel, "text": config.message }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transient(format!("Slack API returned {}", status)));
        }

        // Slack reports failures in-band with HTTP 200.
        let body: Value = response.json().await?;
        if body.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            let reason = body
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            return match reason {
                "channel_not_found" => Err(Error::NotFound(format!("Slack channel '{}'", channel))),
                "invalid_auth" | "token_revoked" => {
                    Err(Error::NotConnected("slack".into()))
                }
                _ => Err(Error::Transient(format!("Slack API error: {}", reason))),
            };
        }

        Ok(json!({ "ok": true, "channel": channel, "ts": body.get("ts").cloned() }))
    }

    async fn post_via_webhook(&self, webhook_url: &str, config: &SlackConfig) -> Result<Value> {
        let response = self
            .client
            .post(webhook_url)
            .json(&json!({ "text": config.message }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotConnected("slack".into()));
        }
        if !status.is_success() {
            return Err(Error::Transient(format!(
                "Slack webhook returned {}",
                status
            )));
        }

        Ok(json!({ "ok": true }))
    }
}

impl Default for SlackHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationHandler for SlackHandler {
    fn integration(&self) -> &str {
        "slack"
    }

    fn description(&self) -> &str {
        "Post messages to Slack channels"
    }

    async fn execute(&self, config: &Value, credential: &CredentialRecord) -> Result<Value> {
        let config: SlackConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::InvalidConfig(format!("slack: {}", e)))?;

        if let Ok(token) = credential.field("bot_token") {
            return self.post_via_api(token, &config).await;
        }
        let webhook_url = credential.field("webhook_url").map_err(|_| {
            Error::InvalidConfig(
                "Credential for 'slack' needs either 'bot_token' or 'webhook_url'".into(),
            )
        })?;
        self.post_via_webhook(webhook_url, &config).await
    }
}
