//! Request pipeline framework.
//!
//! Every request passes four stages, outermost first:
//!
//! 1. **Context** (`middleware::context`): `Request<B>` -> `RequestContext<B>`
//! 2. **Audit** (`middleware::audit`): timing header plus audit record
//! 3. **Usage** (`middleware::usage`): usage record per tenant
//! 4. **Entitlement** (`middleware::entitlement`): required-role gate
//!
//! Stage settings live in `config`; failures in `error`.

pub mod config;
pub mod context;
pub mod error;
pub mod middleware;

// Re-export key types for convenient access.
pub use config::{AuditConfig, ContextConfig, EntitlementConfig, UsageConfig};
pub use context::{RequestContext, ResponseHeaders};
pub use error::{ConfigError, PipelineError, Rejection};
pub use middleware::{build_pipeline, Pipeline, PipelineLayers};
