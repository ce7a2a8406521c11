//! Liveness endpoint handler.

use axum::http::StatusCode;

/// Liveness probe -- always returns 200 OK.
///
/// Sits outside the request pipeline, so probes need neither a token nor a
/// correlation id.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn liveness_handler_always_returns_200() {
        let status = liveness_handler().await;
        assert_eq!(status, StatusCode::OK);
    }
}
