//! Decoding of signature-verified token claims into a [`Principal`].
//!
//! Two claim encodings exist. A deployment picks one as canonical through
//! [`ClaimsEncoding`]; they are never mixed within one pipeline.
//!
//! - [`ClaimsEncoding::Nested`]: a `user` or `app` sub-object next to the
//!   registered claims.
//! - [`ClaimsEncoding::Bundle`]: flat `sub`/`aud`/`rol`/`cls`/`ver` claims and
//!   an `rsc` tenant resource of the form `<tenant-uuid>:<tenant-name>`.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::types::{AppPrincipal, BundlePrincipal, Principal, UserPrincipal};

/// Claim encoding used by a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimsEncoding {
    #[default]
    Nested,
    Bundle,
}

/// The claims object does not have the shape the deployment expects.
///
/// Signature validity is not part of this error: claims reaching the decoder
/// have already been verified.
#[derive(Debug, thiserror::Error)]
pub enum ClaimsShapeError {
    #[error("failed to cast claims into the expected structure: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("claims carry neither a user nor an app principal")]
    NoPrincipal,
    #[error("tenant resource carries an invalid tenant id {value:?}")]
    InvalidTenantId { value: String },
}

/// `user` claim of the nested encoding.
///
/// Missing fields decode to their zero values: an empty id or a nil tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(default)]
    pub global_admin: bool,
    #[serde(default)]
    pub customer_admin: bool,
    #[serde(default)]
    pub tenant_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub tenant_id: Uuid,
}

/// `app` claim of the nested encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppClaims {
    #[serde(default)]
    pub tenant_name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub client_id: Uuid,
    #[serde(default)]
    pub tenant_id: Uuid,
}

/// Full claim set of the nested encoding.
///
/// Registered claims are decoded leniently; the pipeline only reads the
/// principal sub-objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedClaims {
    #[serde(default)]
    pub user: Option<UserClaims>,
    #[serde(default)]
    pub app: Option<AppClaims>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Flattened role/audience claim set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    #[serde(default)]
    pub rol: Vec<String>,
    #[serde(default)]
    pub cls: String,
    #[serde(default)]
    pub ver: String,
    #[serde(default)]
    pub rsc: String,
}

/// Accepts `aud` as a single string, an array of strings or null.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

impl NestedClaims {
    /// Resolves the principal. A `user` object takes precedence over `app`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsShapeError::NoPrincipal`] when neither object is present.
    pub fn into_principal(self) -> Result<Principal, ClaimsShapeError> {
        if let Some(user) = self.user {
            return Ok(Principal::User(UserPrincipal {
                global_admin: user.global_admin,
                customer_admin: user.customer_admin,
                user_id: user.user_id,
                tenant_id: user.tenant_id,
                tenant_name: user.tenant_name,
            }));
        }
        if let Some(app) = self.app {
            return Ok(Principal::App(AppPrincipal {
                client_id: app.client_id,
                user: app.user,
                tenant_id: app.tenant_id,
                tenant_name: app.tenant_name,
            }));
        }
        Err(ClaimsShapeError::NoPrincipal)
    }
}

impl BundleClaims {
    /// Resolves the principal, splitting the tenant resource.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsShapeError::InvalidTenantId`] when the resource has two
    /// parts but the first is not a UUID.
    pub fn into_principal(self) -> Result<Principal, ClaimsShapeError> {
        let (tenant_id, tenant_name) =
            split_tenant_resource(&self.rsc)?.unwrap_or_else(|| (Uuid::nil(), String::new()));
        Ok(Principal::Bundle(BundlePrincipal {
            sub: self.sub,
            aud: self.aud,
            rol: self.rol,
            cls: self.cls,
            ver: self.ver,
            tenant_id,
            tenant_name,
        }))
    }
}

/// Splits `<tenant-uuid>:<tenant-name>` into its parts.
///
/// Anything other than exactly two colon-separated parts yields `Ok(None)`:
/// the caller is treated as having no tenant rather than failing the request.
///
/// # Errors
///
/// Returns [`ClaimsShapeError::InvalidTenantId`] when there are exactly two
/// parts and the first does not parse as a UUID.
pub fn split_tenant_resource(rsc: &str) -> Result<Option<(Uuid, String)>, ClaimsShapeError> {
    let mut parts = rsc.split(':');
    let (Some(id), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        tracing::debug!(resource = rsc, "tenant resource is not <id>:<name>, leaving tenant empty");
        return Ok(None);
    };
    let tenant_id = Uuid::parse_str(id).map_err(|_| ClaimsShapeError::InvalidTenantId {
        value: id.to_string(),
    })?;
    Ok(Some((tenant_id, name.to_string())))
}

/// Decodes verified claims into a [`Principal`] using the deployment's encoding.
///
/// # Errors
///
/// Returns [`ClaimsShapeError`] when the claims cannot be cast into the
/// expected structure.
pub fn decode_principal(
    claims: &serde_json::Value,
    encoding: ClaimsEncoding,
) -> Result<Principal, ClaimsShapeError> {
    match encoding {
        ClaimsEncoding::Nested => NestedClaims::deserialize(claims)?.into_principal(),
        ClaimsEncoding::Bundle => BundleClaims::deserialize(claims)?.into_principal(),
    }
}
