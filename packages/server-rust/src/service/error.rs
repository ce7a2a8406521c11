//! Error taxonomy of the request pipeline.
//!
//! Every stage either forwards or fails; the failure becomes the request's
//! final error and is mapped to an HTTP status at the framework boundary.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{HeaderMap, StatusCode};
use serde_json::json;
use tollgate_core::{BuildMode, ClaimsShapeError, ClassifierError, ModeError};

/// Per-request pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("JWT token missing or invalid")]
    MissingToken,
    #[error(transparent)]
    ClaimsShape(#[from] ClaimsShapeError),
    #[error("failed to get request id from header {header}")]
    MissingCorrelationId { header: String },
    #[error("failed to write audit record: {0}")]
    SinkWrite(#[source] anyhow::Error),
    #[error("failed to enqueue usage record: {0}")]
    QueueEnqueue(#[source] anyhow::Error),
    #[error("invalid Authorization header or tenant")]
    EntitlementBadRequest,
    #[error("user has not enough entitlements, missing {missing:?}")]
    EntitlementForbidden { missing: Vec<String> },
    #[error("entitlement service failed: {0}")]
    EntitlementUpstream(#[source] anyhow::Error),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    /// Failure returned by the wrapped handler itself.
    #[error("{message}")]
    Handler { status: StatusCode, message: String },
}

impl PipelineError {
    /// Handler failure with an explicit status.
    #[must_use]
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Handler {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::ClaimsShape(_) => StatusCode::UNAUTHORIZED,
            Self::MissingCorrelationId { .. } | Self::EntitlementBadRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::EntitlementForbidden { .. } => StatusCode::FORBIDDEN,
            Self::SinkWrite(_)
            | Self::QueueEnqueue(_)
            | Self::EntitlementUpstream(_)
            | Self::Classifier(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Handler { status, .. } => *status,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

/// A [`PipelineError`] together with the response headers stages appended
/// before it occurred, so they reach the client on error responses too.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Rejection {
    #[source]
    error: PipelineError,
    headers: HeaderMap,
}

impl Rejection {
    #[must_use]
    pub fn new(error: PipelineError, headers: HeaderMap) -> Self {
        Self { error, headers }
    }

    #[must_use]
    pub fn error(&self) -> &PipelineError {
        &self.error
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn into_error(self) -> PipelineError {
        self.error
    }
}

impl From<PipelineError> for Rejection {
    fn from(error: PipelineError) -> Self {
        Self::new(error, HeaderMap::new())
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let mut response = self.error.into_response();
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Construction-time misconfiguration. Prevents the pipeline from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("usage middleware - product id is nil")]
    NilProductId,
    #[error("usage middleware - memory MB is empty")]
    EmptyMemoryDescriptor,
    #[error("audit table name is empty")]
    EmptyAuditTable,
    #[error("no entitlement service URL configured for build mode {0}")]
    MissingEntitlementUrl(BuildMode),
    #[error(transparent)]
    Mode(#[from] ModeError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error("failed to fetch signing key {name}: {source}")]
    SecretFetch {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use http::header::HeaderValue;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(PipelineError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            PipelineError::MissingCorrelationId {
                header: "x-request-id".to_string()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PipelineError::EntitlementBadRequest.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PipelineError::EntitlementForbidden { missing: vec![] }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            PipelineError::EntitlementUpstream(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::SinkWrite(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::handler(StatusCode::NOT_FOUND, "foo_error").status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn rejection_response_carries_appended_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-process-time", HeaderValue::from_static("1.000ms"));
        let rejection = Rejection::new(PipelineError::EntitlementBadRequest, headers);

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-process-time"], "1.000ms");
    }

    proptest! {
        #[test]
        fn handler_status_is_preserved(code in 100u16..1000) {
            let status = StatusCode::from_u16(code).unwrap();
            let error = PipelineError::handler(status, "foo");
            prop_assert_eq!(error.status_code(), status);
            prop_assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn config_errors_read_like_their_cause() {
        assert_eq!(
            ConfigError::NilProductId.to_string(),
            "usage middleware - product id is nil"
        );
        assert_eq!(
            ConfigError::from(ModeError("foo".to_string())).to_string(),
            "unknown build mode \"foo\", expected one of test, dev, prod"
        );
    }
}
