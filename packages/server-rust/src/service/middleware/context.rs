//! Pipeline entry: resolves the caller from verified claims and the request
//! correlation header, then hands a [`RequestContext`] to the next stage.
//!
//! This stage is the outermost one. It merges the response headers appended
//! by inner stages into the final response, or into the [`Rejection`] when
//! the request fails.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{HeaderMap, Request, Response};
use tollgate_core::{decode_principal, CallerContext};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::auth::VerifiedToken;
use crate::service::config::ContextConfig;
use crate::service::context::RequestContext;
use crate::service::error::{PipelineError, Rejection};

// ---------------------------------------------------------------------------
// ContextLayer
// ---------------------------------------------------------------------------

/// Tower layer that turns a plain `Request<B>` into a [`RequestContext<B>`].
#[derive(Debug, Clone, Default)]
pub struct ContextLayer {
    config: Arc<ContextConfig>,
}

impl ContextLayer {
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for ContextLayer {
    type Service = ContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContextService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

// ---------------------------------------------------------------------------
// ContextService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ContextService<S> {
    inner: S,
    config: Arc<ContextConfig>,
}

impl<S, B, ResB> Service<Request<B>> for ContextService<S>
where
    S: Service<RequestContext<B>, Response = Response<ResB>, Error = PipelineError> + Send,
    S::Future: Send + 'static,
    ResB: Send + 'static,
{
    type Response = Response<ResB>;
    type Error = Rejection;
    type Future = Pin<Box<dyn Future<Output = Result<Response<ResB>, Rejection>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Rejection::from)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let ctx = match build_context(&self.config, req) {
            Ok(ctx) => ctx,
            Err(error) => {
                tracing::debug!(error = %error, "rejecting request at pipeline entry");
                return Box::pin(async move { Err(Rejection::from(error)) });
            }
        };

        let response_headers = ctx.response_headers().clone();
        let fut = self.inner.call(ctx);
        Box::pin(async move {
            match fut.await {
                Ok(mut response) => {
                    response.headers_mut().extend(response_headers.take());
                    Ok(response)
                }
                Err(error) => Err(Rejection::new(error, response_headers.take())),
            }
        })
    }
}

/// Resolves the caller for `req`.
///
/// # Errors
///
/// - [`PipelineError::MissingToken`] when no verified token is attached
/// - [`PipelineError::ClaimsShape`] when the claims have the wrong shape
/// - [`PipelineError::MissingCorrelationId`] when the correlation header is
///   absent, empty or not a UUID
pub fn build_context<B>(
    config: &ContextConfig,
    req: Request<B>,
) -> Result<RequestContext<B>, PipelineError> {
    let token = req
        .extensions()
        .get::<VerifiedToken>()
        .ok_or(PipelineError::MissingToken)?;
    let principal = decode_principal(token.claims(), config.encoding)?;
    let request_id = correlation_id(req.headers(), config)?;

    let caller = CallerContext::new(&principal, request_id);
    Ok(RequestContext::new(req, caller))
}

fn correlation_id(headers: &HeaderMap, config: &ContextConfig) -> Result<Uuid, PipelineError> {
    headers
        .get(&config.correlation_header)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or_else(|| PipelineError::MissingCorrelationId {
            header: config.correlation_header.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
