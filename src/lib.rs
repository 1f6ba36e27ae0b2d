//! autom8 - multi-tenant workflow execution engine
//!
//! autom8 runs stored automation definitions (a trigger plus an ordered
//! list of steps referencing third-party integrations) against live
//! external APIs, with per-tenant monthly quotas, bounded retries, and a
//! circuit breaker per integration.
//!
//! Definition storage, tenant/plan lookup, and credential storage are
//! external collaborators modeled as traits in [`storage`]; in-memory
//! implementations are provided for embedding and tests.
//!
//! ## Example
//!
//! ```yaml
//! id: order-digest
//! tenant_id: acme
//! enabled: true
//!
//! steps:
//!   - id: trigger
//!     kind: trigger
//!
//!   - id: fetch-orders
//!     kind: action
//!     integration: shopify
//!     config:
//!       operation: get_orders
//!       date: today
//!
//!   - id: notify
//!     kind: action
//!     integration: slack
//!     config:
//!       channel: "#orders"
//!       message: "Orders today: {{fetch-orders.count}}"
//! ```
//!
//! Step execution is at-least-once: a retried action step may repeat an
//! external side effect. No idempotency key is attached to outbound
//! calls, so integrations that are not idempotent may observe duplicates.

pub mod engine;
pub mod error;
pub mod recorder;
pub mod steps;
pub mod storage;
pub mod telemetry;
pub mod template;
pub mod workflow;

pub use engine::{BreakerRegistry, CancelSignal, Orchestrator, RateLimiter, RetryPolicy};
pub use error::{Error, Result};
