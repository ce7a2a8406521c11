//! Tollgate server: tower middleware that resolves the caller, audits and
//! meters each call, and enforces entitlements in front of an HTTP handler.

pub mod auth;
pub mod clients;
pub mod network;
pub mod service;
pub mod traits;

pub use auth::{fetch_signing_key, JwtLayer, VerifiedToken};
pub use service::{build_pipeline, ConfigError, PipelineError, PipelineLayers, Rejection, RequestContext};
pub use traits::{AuditSink, EntitlementSource, SecretStore, UsageQueue};
