//! Pipeline composition: wraps a handler in the four request stages.

use tower::ServiceBuilder;

use super::audit::{AuditLayer, AuditService};
use super::context::{ContextLayer, ContextService};
use super::entitlement::{EntitlementLayer, EntitlementService};
use super::usage::{UsageLayer, UsageService};

/// Full service stack around a handler `H`.
pub type Pipeline<H> = ContextService<AuditService<UsageService<EntitlementService<H>>>>;

/// The configured stages, each built (and validated) by its own constructor.
#[derive(Clone)]
pub struct PipelineLayers {
    pub context: ContextLayer,
    pub audit: AuditLayer,
    pub usage: UsageLayer,
    pub entitlement: EntitlementLayer,
}

/// Wraps `handler` with every stage.
///
/// Layer order (outermost to innermost):
/// 1. `ContextLayer` -- resolve the caller; merge response headers
/// 2. `AuditLayer` -- time the call and audit external traffic
/// 3. `UsageLayer` -- meter tenant-attributed calls
/// 4. `EntitlementLayer` -- reject callers lacking required roles
///
/// The returned service implements `tower::Service<http::Request<B>>` with
/// [`Rejection`](crate::service::error::Rejection) as its error.
#[must_use]
pub fn build_pipeline<H>(layers: PipelineLayers, handler: H) -> Pipeline<H> {
    ServiceBuilder::new()
        .layer(layers.context)
        .layer(layers.audit)
        .layer(layers.usage)
        .layer(layers.entitlement)
        .service(handler)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
