//! Entitlement middleware.
//!
//! Asks the entitlement service which groups the caller holds and lets the
//! request through only when every required role is among them.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::AUTHORIZATION;
use http::Response;
use tollgate_core::granted_roles;
use tower::{Layer, Service};

use crate::service::config::EntitlementConfig;
use crate::service::context::RequestContext;
use crate::service::error::PipelineError;
use crate::traits::EntitlementSource;

// ---------------------------------------------------------------------------
// EntitlementLayer
// ---------------------------------------------------------------------------

/// Tower layer gating requests on the caller's entitlement groups.
#[derive(Clone)]
pub struct EntitlementLayer {
    source: Arc<dyn EntitlementSource>,
    config: Arc<EntitlementConfig>,
}

impl EntitlementLayer {
    #[must_use]
    pub fn new(source: Arc<dyn EntitlementSource>, config: EntitlementConfig) -> Self {
        Self {
            source,
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for EntitlementLayer {
    type Service = EntitlementService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EntitlementService {
            inner,
            source: Arc::clone(&self.source),
            config: Arc::clone(&self.config),
        }
    }
}

// ---------------------------------------------------------------------------
// EntitlementService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct EntitlementService<S> {
    inner: S,
    source: Arc<dyn EntitlementSource>,
    config: Arc<EntitlementConfig>,
}

impl<S, B, ResB> Service<RequestContext<B>> for EntitlementService<S>
where
    S: Service<RequestContext<B>, Response = Response<ResB>, Error = PipelineError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
    ResB: Send + 'static,
{
    type Response = Response<ResB>;
    type Error = PipelineError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResB>, PipelineError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: RequestContext<B>) -> Self::Future {
        // The readied service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let source = Arc::clone(&self.source);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            // Forwarded as raw bytes; only an empty value counts as missing.
            let authorization = ctx
                .request()
                .headers()
                .get(AUTHORIZATION)
                .filter(|value| !value.is_empty())
                .cloned();
            let tenant_id = ctx.tenant_id();
            let Some(authorization) = authorization.filter(|_| !tenant_id.is_nil()) else {
                tracing::debug!(request_id = %ctx.request_id(), "missing authorization or tenant");
                return Err(PipelineError::EntitlementBadRequest);
            };

            let groups = source
                .fetch_groups(config.url(), &authorization, tenant_id)
                .await
                .map_err(|e| {
                    tracing::warn!(
                        request_id = %ctx.request_id(),
                        tenant_id = %tenant_id,
                        error = %e,
                        "entitlement lookup failed"
                    );
                    PipelineError::EntitlementUpstream(e)
                })?;

            let granted = granted_roles(&groups);
            if !config.roles().is_satisfied_by(&granted) {
                let missing = config.roles().missing(&granted);
                tracing::info!(
                    request_id = %ctx.request_id(),
                    tenant_id = %tenant_id,
                    missing = ?missing,
                    "caller lacks required roles"
                );
                return Err(PipelineError::EntitlementForbidden { missing });
            }

            inner.call(ctx).await
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::{HeaderValue, Request, StatusCode};
    use tollgate_core::{BuildMode, CallerContext, Principal, UserPrincipal};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::clients::StaticEntitlementSource;

    const TENANT: &str = "dd49bb44-ac56-4e70-8697-89603f4125f2";
    const TOKEN: &str = "Bearer foo.bar.baz";

    #[derive(Clone, Default)]
    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Service<RequestContext<()>> for CountingHandler {
        type Response = Response<()>;
        type Error = PipelineError;
        type Future = Pin<Box<dyn Future<Output = Result<Response<()>, PipelineError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _ctx: RequestContext<()>) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(PipelineError::handler(StatusCode::CONFLICT, "foo handler"))
                } else {
                    Ok(Response::new(()))
                }
            })
        }
    }

    fn make_ctx(authorization: Option<&str>, tenant: Uuid) -> RequestContext<()> {
        make_raw_ctx(authorization.map(HeaderValue::from_str).transpose().unwrap(), tenant)
    }

    fn make_raw_ctx(authorization: Option<HeaderValue>, tenant: Uuid) -> RequestContext<()> {
        let mut builder = Request::builder().uri("/workflows");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let principal = Principal::User(UserPrincipal {
            global_admin: false,
            customer_admin: false,
            user_id: "foo@bar.com".to_string(),
            tenant_id: tenant,
            tenant_name: "foo_tenant".to_string(),
        });
        RequestContext::new(
            builder.body(()).unwrap(),
            CallerContext::new(&principal, Uuid::new_v4()),
        )
    }

    fn tenant() -> Uuid {
        Uuid::parse_str(TENANT).unwrap()
    }

    fn layer(source: &Arc<StaticEntitlementSource>, roles: &[&str]) -> EntitlementLayer {
        let source: Arc<dyn EntitlementSource> = source.clone();
        let config = EntitlementConfig::resolve(
            roles.iter().map(|r| (*r).to_string()).collect(),
            Some("http://entitlements.local/groups/".to_string()),
            BuildMode::Test,
        )
        .unwrap();
        EntitlementLayer::new(source, config)
    }

    #[tokio::test]
    async fn exact_roles_pass() {
        let source = Arc::new(StaticEntitlementSource::new(["A", "B"]));
        let handler = CountingHandler::default();
        let svc = layer(&source, &["A", "B"]).layer(handler.clone());

        svc.oneshot(make_ctx(Some(TOKEN), tenant())).await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        let lookups = source.lookups();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].0, "http://entitlements.local/groups/");
        assert_eq!(lookups[0].1, TOKEN);
        assert_eq!(lookups[0].2, tenant());
    }

    #[tokio::test]
    async fn opaque_authorization_bytes_are_forwarded() {
        let raw = HeaderValue::from_bytes(b"Bearer caf\xe9").unwrap();
        assert!(raw.to_str().is_err());

        let ctx = make_raw_ctx(Some(raw.clone()), tenant());

        let source = Arc::new(StaticEntitlementSource::new(["A"]));
        let handler = CountingHandler::default();
        let svc = layer(&source, &["A"]).layer(handler.clone());

        svc.oneshot(ctx).await.unwrap();
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.lookups()[0].1, raw);
    }

    #[tokio::test]
    async fn extra_roles_pass() {
        let source = Arc::new(StaticEntitlementSource::new(["A", "B", "C"]));
        let svc = layer(&source, &["A", "B"]).layer(CountingHandler::default());
        svc.oneshot(make_ctx(Some(TOKEN), tenant())).await.unwrap();
    }

    #[tokio::test]
    async fn missing_role_is_forbidden() {
        let source = Arc::new(StaticEntitlementSource::new(["A"]));
        let handler = CountingHandler::default();
        let svc = layer(&source, &["A", "B"]).layer(handler.clone());

        let err = svc.oneshot(make_ctx(Some(TOKEN), tenant())).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        match err {
            PipelineError::EntitlementForbidden { missing } => assert_eq!(missing, vec!["B"]),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn default_roles_apply_when_none_configured() {
        let source = Arc::new(StaticEntitlementSource::new(["service.workflow.user"]));
        let svc = layer(&source, &[]).layer(CountingHandler::default());

        let err = svc.oneshot(make_ctx(Some(TOKEN), tenant())).await.unwrap_err();
        assert!(matches!(err, PipelineError::EntitlementForbidden { .. }));
    }

    #[tokio::test]
    async fn missing_authorization_or_tenant_is_bad_request() {
        for ctx in [
            make_ctx(None, tenant()),
            make_ctx(Some(""), tenant()),
            make_ctx(Some(TOKEN), Uuid::nil()),
        ] {
            let source = Arc::new(StaticEntitlementSource::new(["A", "B"]));
            let svc = layer(&source, &["A", "B"]).layer(CountingHandler::default());

            let err = svc.oneshot(ctx).await.unwrap_err();
            assert!(matches!(err, PipelineError::EntitlementBadRequest));
            assert!(source.lookups().is_empty());
        }
    }

    #[tokio::test]
    async fn upstream_failure_is_internal_error() {
        let source = Arc::new(StaticEntitlementSource::failing("foo entitlements"));
        let svc = layer(&source, &["A"]).layer(CountingHandler::default());

        let err = svc.oneshot(make_ctx(Some(TOKEN), tenant())).await.unwrap_err();
        assert!(matches!(err, PipelineError::EntitlementUpstream(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "entitlement service failed: foo entitlements"
        );
    }

    #[tokio::test]
    async fn handler_error_passes_through() {
        let source = Arc::new(StaticEntitlementSource::new(["A"]));
        let svc = layer(&source, &["A"]).layer(CountingHandler {
            fail: true,
            ..CountingHandler::default()
        });

        let err = svc.oneshot(make_ctx(Some(TOKEN), tenant())).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
