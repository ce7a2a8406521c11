//! Implementations of the collaborator traits in [`crate::traits`].
//!
//! - [`entitlements`]: HTTP client for the entitlement service
//! - [`memory`]: In-memory stores for tests and local runs

pub mod entitlements;
pub mod memory;

pub use entitlements::HttpEntitlementSource;
pub use memory::{MemoryAuditSink, MemorySecretStore, MemoryUsageQueue, StaticEntitlementSource};
