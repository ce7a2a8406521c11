//! Tower middleware layers for the request pipeline.
//!
//! - [`context`]: Caller resolution from verified claims and correlation id
//! - [`audit`]: Call timing and audit records for external traffic
//! - [`usage`]: Usage metering per tenant
//! - [`entitlement`]: Role checks against the entitlement service
//! - [`pipeline`]: Composes all layers around a handler

pub mod audit;
pub mod context;
pub mod entitlement;
pub mod pipeline;
pub mod usage;

pub use audit::AuditLayer;
pub use context::{build_context, ContextLayer};
pub use entitlement::EntitlementLayer;
pub use pipeline::{build_pipeline, Pipeline, PipelineLayers};
pub use usage::UsageLayer;
