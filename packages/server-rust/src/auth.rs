//! Token verification boundary.
//!
//! The pipeline never parses tokens itself: it reads the claims of a
//! [`VerifiedToken`] found in the request extensions. [`JwtLayer`] is one way
//! to put it there, verifying an HS256 bearer token with a key obtained
//! through [`fetch_signing_key`].

use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::AUTHORIZATION;
use http::Request;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tollgate_core::BuildMode;
use tower::{Layer, Service};

use crate::service::error::ConfigError;
use crate::traits::SecretStore;

/// Claims of a token that was already verified by the authentication layer.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    claims: Value,
}

impl VerifiedToken {
    #[must_use]
    pub fn new(claims: Value) -> Self {
        Self { claims }
    }

    #[must_use]
    pub fn claims(&self) -> &Value {
        &self.claims
    }
}

/// Reads the token signing key for `mode` from the secret store.
///
/// # Errors
///
/// Returns [`ConfigError::SecretFetch`] when the store cannot provide it.
pub async fn fetch_signing_key(
    store: &dyn SecretStore,
    mode: BuildMode,
) -> Result<String, ConfigError> {
    let name = mode.signing_key_name();
    let key = store
        .get_secret(name)
        .await
        .map_err(|source| ConfigError::SecretFetch { name, source })?;
    tracing::debug!(mode = %mode, key = name, "signing key loaded");
    Ok(key)
}

// ---------------------------------------------------------------------------
// JwtLayer
// ---------------------------------------------------------------------------

/// Verifies `Authorization: Bearer <jwt>` and attaches a [`VerifiedToken`].
///
/// Requests with a missing or invalid token pass through untouched; the
/// context stage rejects them.
#[derive(Clone)]
pub struct JwtLayer {
    verifier: Arc<Verifier>,
}

struct Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtLayer {
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        Self {
            verifier: Arc::new(Verifier {
                key: DecodingKey::from_secret(secret),
                validation,
            }),
        }
    }
}

impl<S> Layer<S> for JwtLayer {
    type Service = JwtService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        JwtService {
            inner,
            verifier: Arc::clone(&self.verifier),
        }
    }
}

#[derive(Clone)]
pub struct JwtService<S> {
    inner: S,
    verifier: Arc<Verifier>,
}

impl Verifier {
    fn verify(&self, authorization: Option<&str>) -> Option<VerifiedToken> {
        let token = authorization?.strip_prefix("Bearer ")?.trim();
        match decode::<Value>(token, &self.key, &self.validation) {
            Ok(data) => Some(VerifiedToken::new(data.claims)),
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                None
            }
        }
    }
}

impl<S, B> Service<Request<B>> for JwtService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let authorization = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        if let Some(token) = self.verifier.verify(authorization) {
            req.extensions_mut().insert(token);
        }
        self.inner.call(req)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
