//! Audit middleware.
//!
//! Times the wrapped handler, always appends an `x-process-time` response
//! header, and writes one [`AuditRecord`] for calls that are attributed to a
//! tenant and user and originate outside the private/reserved networks.
//!
//! Error precedence: a handler error is returned even when the audit write
//! also failed; on handler success an audit failure becomes the result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::Utc;
use http::header::{HeaderName, HeaderValue};
use http::{Response, StatusCode};
use tollgate_core::{is_private, AuditRecord, NetworkClassifier};
use tower::{Layer, Service};

use crate::service::config::{AuditConfig, X_PROCESS_TIME};
use crate::service::context::RequestContext;
use crate::service::error::{ConfigError, PipelineError};
use crate::traits::AuditSink;

// ---------------------------------------------------------------------------
// AuditLayer
// ---------------------------------------------------------------------------

/// Tower layer that audits externally originated, tenant-attributed calls.
#[derive(Clone)]
pub struct AuditLayer {
    sink: Arc<dyn AuditSink>,
    config: Arc<AuditConfig>,
}

impl AuditLayer {
    /// # Errors
    ///
    /// Returns [`ConfigError::Classifier`] if the reserved network table does
    /// not parse.
    pub fn new(sink: Arc<dyn AuditSink>, config: AuditConfig) -> Result<Self, ConfigError> {
        NetworkClassifier::reserved()?;
        Ok(Self {
            sink,
            config: Arc::new(config),
        })
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditService {
            inner,
            sink: Arc::clone(&self.sink),
            config: Arc::clone(&self.config),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AuditService<S> {
    inner: S,
    sink: Arc<dyn AuditSink>,
    config: Arc<AuditConfig>,
}

/// What the audit decision needs from the request, captured before the
/// context moves into the handler.
struct CallSummary {
    request_id: uuid::Uuid,
    tenant_id: uuid::Uuid,
    user_id: String,
    url: String,
    method: String,
    source_ip: Option<String>,
    attributed: bool,
}

impl<S, B, ResB> Service<RequestContext<B>> for AuditService<S>
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
        let request = ctx.request();
        // Non-UTF-8 values still count as present; they fail to parse as an
        // address and are therefore audited.
        let source_ip = request
            .headers()
            .get(self.config.source_ip_header())
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .filter(|ip| !ip.is_empty());
        let summary = CallSummary {
            request_id: ctx.request_id(),
            tenant_id: ctx.tenant_id(),
            user_id: ctx.caller().user_id.clone(),
            url: request.uri().to_string(),
            method: request.method().to_string(),
            source_ip,
            attributed: ctx.user_and_tenant_present(),
        };
        let response_headers = ctx.response_headers().clone();

        let sink = Arc::clone(&self.sink);
        let config = Arc::clone(&self.config);
        let fut = self.inner.call(ctx);

        Box::pin(async move {
            let created_at = Utc::now();
            let start = Instant::now();
            let result = fut.await;
            let process_time = start.elapsed();

            let elapsed = format!("{:.3}ms", process_time.as_secs_f64() * 1000.0);
            if let Ok(value) = HeaderValue::from_str(&elapsed) {
                response_headers.append(HeaderName::from_static(X_PROCESS_TIME), value);
            }

            let status = match &result {
                Ok(response) => response.status(),
                Err(error) => error.status_code(),
            };
            let audited = audit(&*sink, &config, summary, status, created_at, process_time).await;

            match (result, audited) {
                (Err(handler_error), _) => Err(handler_error),
                (Ok(_), Err(audit_error)) => Err(audit_error),
                (Ok(response), Ok(())) => Ok(response),
            }
        })
    }
}

async fn audit(
    sink: &dyn AuditSink,
    config: &AuditConfig,
    summary: CallSummary,
    status: StatusCode,
    created_at: chrono::DateTime<Utc>,
    process_time: std::time::Duration,
) -> Result<(), PipelineError> {
    let Some(client_ip) = summary.source_ip.filter(|_| summary.attributed) else {
        tracing::debug!(request_id = %summary.request_id, "anonymous or unsourced call, not audited");
        return Ok(());
    };
    if is_private(&client_ip)? {
        tracing::debug!(request_id = %summary.request_id, client_ip = %client_ip, "internal call, not audited");
        return Ok(());
    }

    let record = AuditRecord {
        id: summary.request_id,
        tenant_id: summary.tenant_id,
        user_id: summary.user_id,
        url: summary.url,
        method: summary.method,
        client_ip,
        status_code: status.as_u16(),
        created_at,
        process_time,
    };

    if let Err(e) = sink.put_record(config.table(), &record).await {
        tracing::warn!(request_id = %record.id, table = config.table(), error = %e, "audit write failed");
        return Err(PipelineError::SinkWrite(e));
    }
    tracing::info!(
        request_id = %record.id,
        tenant_id = %record.tenant_id,
        user_id = %record.user_id,
        method = %record.method,
        url = %record.url,
        client_ip = %record.client_ip,
        status = record.status_code,
        duration_ms = u64::try_from(record.process_time.as_millis()).unwrap_or(u64::MAX),
        "audit record written"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
