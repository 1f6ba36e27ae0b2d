//! Shopify integration handler.
//!
//! Talks to the Shopify Admin REST API using a per-tenant access token.
//! Credential fields: `shop_domain` (e.g. `acme.myshopify.com`) and
//! `access_token`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::types::IntegrationHandler;
use crate::error::{Error, Result};
use crate::storage::CredentialRecord;

const API_VERSION: &str = "2024-07";

#[derive(Debug, Deserialize)]
struct ShopifyConfig {
    operation: String,
    #[serde(default)]
    status: Option<String>,
    /// `"today"` or an RFC 3339 lower bound on creation time.
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

pub struct ShopifyHandler {
    client: Client,
}

impl ShopifyHandler {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    async fn get_orders(&self, config: &ShopifyConfig, credential: &CredentialRecord) -> Result<Value> {
        let shop = credential.field("shop_domain")?;
        let token = credential.field("access_token")?;

        let url = format!("https://{}/admin/api/{}/orders.json", shop, API_VERSION);
        let mut request = self
            .client
            .get(&url)
            .header("X-Shopify-Access-Token", token);

        if let Some(status) = &config.status {
            request = request.query(&[("status", status.as_str())]);
        }
        if let Some(limit) = config.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }
        if let Some(date) = &config.date {
            request = request.query(&[("created_at_min", created_at_min(date)?)]);
        }

        let response = request.send().await?;
        let body = check_response(response).await?;

        let orders = body
            .get("orders")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(json!({ "count": orders.len(), "orders": orders }))
    }

    async fn get_products(&self, config: &ShopifyConfig, credential: &CredentialRecord) -> Result<Value> {
        let shop = credential.field("shop_domain")?;
        let token = credential.field("access_token")?;

        let url = format!("https://{}/admin/api/{}/products.json", shop, API_VERSION);
        let mut request = self
            .client
            .get(&url)
            .header("X-Shopify-Access-Token", token);
        if let Some(limit) = config.limit {
            request = request.query(&[("limit", limit.to_string())]);
        }

        let response = request.send().await?;
        let body = check_response(response).await?;

        let products = body
            .get("products")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(json!({ "count": products.len(), "products": products }))
    }
}

fn created_at_min(date: &str) -> Result<String> {
    if date == "today" {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();
        return Ok(midnight.to_rfc3339());
    }
    Ok(date.to_string())
}

async fn check_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::NotFound("Shopify resource".into()));
    }
    if !status.is_success() {
        return Err(Error::Transient(format!(
            "Shopify API returned {}",
            status
        )));
    }
    Ok(response.json().await?)
}

impl Default for ShopifyHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationHandler for ShopifyHandler {
    fn integration(&self) -> &str {
        "shopify"
    }

    fn description(&self) -> &str {
        "Read orders and products from a Shopify store"
    }

    async fn execute(&self, config: &Value, credential: &CredentialRecord) -> Result<Value> {
        let config: ShopifyConfig = serde_json::from_value(config.clone())
            .map_err(|e| Error::InvalidConfig(format!("shopify: {}", e)))?;

        match config.operation.as_str() {
            "get_orders" => self.get_orders(&config, credential).await,
            "get_products" => self.get_products(&config, credential).await,
            other => Err(Error::InvalidConfig(format!(
                "Unknown shopify operation: {}",
                other
            ))),
        }
    }
}
