//! Usage metering middleware.
//!
//! Enqueues one [`UsageRecord`] for every call attributed to a tenant,
//! regardless of where it originated.
//!
//! Error precedence differs from the audit stage: the enqueue happens before
//! the handler result is inspected, so an enqueue failure is returned even
//! when the handler failed too.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::Utc;
use http::Response;
use tollgate_core::UsageRecord;
use tower::{Layer, Service};

use crate::service::config::UsageConfig;
use crate::service::context::RequestContext;
use crate::service::error::PipelineError;
use crate::traits::UsageQueue;

// ---------------------------------------------------------------------------
// UsageLayer
// ---------------------------------------------------------------------------

/// Tower layer that meters tenant-attributed calls onto a usage queue.
#[derive(Clone)]
pub struct UsageLayer {
    queue: Arc<dyn UsageQueue>,
    config: Arc<UsageConfig>,
}

impl UsageLayer {
    /// `config` is already validated by [`UsageConfig::new`].
    #[must_use]
    pub fn new(queue: Arc<dyn UsageQueue>, config: UsageConfig) -> Self {
        Self {
            queue,
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for UsageLayer {
    type Service = UsageService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        UsageService {
            inner,
            queue: Arc::clone(&self.queue),
            config: Arc::clone(&self.config),
        }
    }
}

// ---------------------------------------------------------------------------
// UsageService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct UsageService<S> {
    inner: S,
    queue: Arc<dyn UsageQueue>,
    config: Arc<UsageConfig>,
}

impl<S, B, ResB> Service<RequestContext<B>> for UsageService<S>
where
    S: Service<RequestContext<B>, Response = Response<ResB>, Error = PipelineError> + Send,
    S::Future: Send + 'static,
    ResB: Send + 'static,
{
    type Response = Response<ResB>;
    type Error = PipelineError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResB>, PipelineError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: RequestContext<B>) -> Self::Future {
        let tenant_id = ctx.tenant_id();
        let request_id = ctx.request_id();
        let workflow = ctx.request().uri().path().to_string();

        let queue = Arc::clone(&self.queue);
        let config = Arc::clone(&self.config);
        let fut = self.inner.call(ctx);

        Box::pin(async move {
            let start_timestamp = Utc::now();
            let result = fut.await;
            let end_timestamp = Utc::now();

            if tenant_id.is_nil() {
                tracing::debug!(request_id = %request_id, "no tenant, usage not metered");
                return result;
            }

            let record = UsageRecord {
                product_id: config.product_id(),
                tenant_id,
                memory_mb: config.memory_mb().to_string(),
                start_timestamp,
                end_timestamp,
                workflow,
            };
            if let Err(e) = queue.enqueue(&record).await {
                tracing::warn!(
                    request_id = %request_id,
                    tenant_id = %tenant_id,
                    error = %e,
                    "usage enqueue failed"
                );
                return Err(PipelineError::QueueEnqueue(e));
            }
            tracing::debug!(
                request_id = %request_id,
                tenant_id = %tenant_id,
                workflow = %record.workflow,
                "usage record enqueued"
            );

            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
