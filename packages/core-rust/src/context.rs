use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Principal, PrincipalKind};

/// Caller identity for one request: the resolved principal flattened into
/// plain fields plus the request correlation id.
///
/// Serializes without nested objects so downstream consumers see the same
/// flat document regardless of which claim shape produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Which claim shape the principal came from.
    pub kind: PrincipalKind,
    pub is_global_admin: bool,
    pub is_customer_admin: bool,
    /// User id, the user an application acts as, or the bundle subject.
    pub user_id: String,
    /// Client id for application callers, `Uuid::nil()` otherwise.
    pub app_id: Uuid,
    pub aud: Vec<String>,
    pub rol: Vec<String>,
    pub cls: String,
    pub ver: String,
    pub tenant_name: String,
    /// `Uuid::nil()` when the caller has no tenant.
    pub tenant_id: Uuid,
    /// Correlation id shared by audit and usage records of this request.
    pub request_id: Uuid,
}

impl CallerContext {
    /// Flattens `principal` and attaches the request correlation id.
    #[must_use]
    pub fn new(principal: &Principal, request_id: Uuid) -> Self {
        let (aud, rol, cls, ver) = match principal {
            Principal::Bundle(b) => (b.aud.clone(), b.rol.clone(), b.cls.clone(), b.ver.clone()),
            Principal::User(_) | Principal::App(_) => {
                (Vec::new(), Vec::new(), String::new(), String::new())
            }
        };

        Self {
            kind: principal.kind(),
            is_global_admin: principal.is_global_admin(),
            is_customer_admin: principal.is_customer_admin(),
            user_id: principal.user_id().to_string(),
            app_id: principal.app_id().unwrap_or_else(Uuid::nil),
            aud,
            rol,
            cls,
            ver,
            tenant_name: principal.tenant_name().to_string(),
            tenant_id: principal.tenant_id(),
            request_id,
        }
    }

    /// True when the call is attributable to both a tenant and a user.
    #[must_use]
    pub fn user_and_tenant_present(&self) -> bool {
        !self.tenant_id.is_nil() && !self.user_id.is_empty()
    }

    #[must_use]
    pub fn has_tenant(&self) -> bool {
        !self.tenant_id.is_nil()
    }
}
