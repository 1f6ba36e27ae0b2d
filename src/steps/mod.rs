//! Step execution: the handler trait, built-in integrations, the
//! registry, and the per-step executor.

mod email;
mod executor;
mod registry;
mod shopify;
mod slack;
mod types;
mod xero;

pub use email::EmailHandler;
pub use executor::StepExecutor;
pub use registry::IntegrationRegistry;
pub use shopify::ShopifyHandler;
pub use slack::SlackHandler;
pub use types::{IntegrationHandler, TenantContext};
pub use xero::XeroHandler;
