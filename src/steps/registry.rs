//! Integration handler registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::email::EmailHandler;
use super::shopify::ShopifyHandler;
use super::slack::SlackHandler;
use super::types::IntegrationHandler;
use super::xero::XeroHandler;

/// Registry of integration handlers keyed by integration name.
///
/// Dispatch is a table lookup; adding an integration means registering a
/// handler, not touching the executor.
pub struct IntegrationRegistry {
    handlers: HashMap<String, Arc<dyn IntegrationHandler>>,
}

impl IntegrationRegistry {
    /// Create a registry with all built-in integrations.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ShopifyHandler::new()));
        registry.register(Arc::new(SlackHandler::new()));
        registry.register(Arc::new(EmailHandler::new()));
        registry.register(Arc::new(XeroHandler::new()));
        registry
    }

    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its integration name.
    pub fn register(&mut self, handler: Arc<dyn IntegrationHandler>) {
        self.handlers
            .insert(handler.integration().to_string(), handler);
    }

    /// Get a handler by integration name.
    pub fn get(&self, integration: &str) -> Option<Arc<dyn IntegrationHandler>> {
        self.handlers.get(integration).cloned()
    }

    /// Check if an integration is registered.
    pub fn has(&self, integration: &str) -> bool {
        self.handlers.contains_key(integration)
    }

    /// List registered integration names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
