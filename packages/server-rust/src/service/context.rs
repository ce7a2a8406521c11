use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Request};
use parking_lot::Mutex;
use tollgate_core::CallerContext;
use uuid::Uuid;

/// Response headers appended by pipeline stages while a request is in flight.
///
/// Cloning shares the underlying map, so a stage can keep a handle after
/// moving the [`RequestContext`] into the next stage.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders(Arc<Mutex<HeaderMap>>);

impl ResponseHeaders {
    pub fn append(&self, name: HeaderName, value: HeaderValue) {
        self.0.lock().append(name, value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<HeaderValue> {
        self.0.lock().get(name).cloned()
    }

    /// Drains the accumulated headers.
    #[must_use]
    pub fn take(&self) -> HeaderMap {
        std::mem::take(&mut *self.0.lock())
    }
}

/// Inbound request plus the caller identity resolved at pipeline entry.
///
/// Built exactly once per request by the context stage. The request and
/// identity are read-only from then on; only response headers are appended.
#[derive(Debug)]
pub struct RequestContext<B> {
    request: Request<B>,
    caller: CallerContext,
    response_headers: ResponseHeaders,
}

impl<B> RequestContext<B> {
    #[must_use]
    pub fn new(request: Request<B>, caller: CallerContext) -> Self {
        Self {
            request,
            caller,
            response_headers: ResponseHeaders::default(),
        }
    }

    /// The framework's request handle.
    #[must_use]
    pub fn request(&self) -> &Request<B> {
        &self.request
    }

    #[must_use]
    pub fn caller(&self) -> &CallerContext {
        &self.caller
    }

    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.caller.request_id
    }

    #[must_use]
    pub fn tenant_id(&self) -> Uuid {
        self.caller.tenant_id
    }

    #[must_use]
    pub fn user_and_tenant_present(&self) -> bool {
        self.caller.user_and_tenant_present()
    }

    #[must_use]
    pub fn response_headers(&self) -> &ResponseHeaders {
        &self.response_headers
    }

    #[must_use]
    pub fn into_parts(self) -> (Request<B>, CallerContext) {
        (self.request, self.caller)
    }
}
