use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A human user acting within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrincipal {
    /// Platform-wide administrator.
    pub global_admin: bool,
    /// Administrator of the user's own tenant.
    pub customer_admin: bool,
    /// User identifier, typically an email address.
    pub user_id: String,
    /// Tenant the user belongs to.
    pub tenant_id: Uuid,
    /// Display name of the tenant.
    pub tenant_name: String,
}

/// A service application (client credentials) acting on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPrincipal {
    /// OAuth client identifier of the application.
    pub client_id: Uuid,
    /// The user the application acts as.
    pub user: String,
    /// Tenant the application is registered in.
    pub tenant_id: Uuid,
    /// Display name of the tenant.
    pub tenant_name: String,
}

/// Flattened subject/audience/role bundle.
///
/// Tenant fields are nil/empty when the token's tenant resource could not be
/// split into an id and a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundlePrincipal {
    /// Subject identifier.
    pub sub: String,
    /// Audiences the token was issued for.
    pub aud: Vec<String>,
    /// Role names carried by the token.
    pub rol: Vec<String>,
    /// Classification tag.
    pub cls: String,
    /// Token version tag.
    pub ver: String,
    /// Tenant id, `Uuid::nil()` when absent.
    pub tenant_id: Uuid,
    /// Tenant display name, empty when absent.
    pub tenant_name: String,
}

/// Who is calling, resolved once per request from verified token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    User(UserPrincipal),
    App(AppPrincipal),
    Bundle(BundlePrincipal),
}

impl Principal {
    /// Discriminant of this principal.
    #[must_use]
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::User(_) => PrincipalKind::User,
            Self::App(_) => PrincipalKind::App,
            Self::Bundle(_) => PrincipalKind::Bundle,
        }
    }

    /// Tenant the caller acts in; `Uuid::nil()` when unknown.
    #[must_use]
    pub fn tenant_id(&self) -> Uuid {
        match self {
            Self::User(u) => u.tenant_id,
            Self::App(a) => a.tenant_id,
            Self::Bundle(b) => b.tenant_id,
        }
    }

    #[must_use]
    pub fn tenant_name(&self) -> &str {
        match self {
            Self::User(u) => &u.tenant_name,
            Self::App(a) => &a.tenant_name,
            Self::Bundle(b) => &b.tenant_name,
        }
    }

    /// The human identity behind the call: the user id, the user an
    /// application acts as, or the bundle subject.
    #[must_use]
    pub fn user_id(&self) -> &str {
        match self {
            Self::User(u) => &u.user_id,
            Self::App(a) => &a.user,
            Self::Bundle(b) => &b.sub,
        }
    }

    /// Applications and bundles never carry admin rights.
    #[must_use]
    pub fn is_global_admin(&self) -> bool {
        matches!(self, Self::User(u) if u.global_admin)
    }

    #[must_use]
    pub fn is_customer_admin(&self) -> bool {
        matches!(self, Self::User(u) if u.customer_admin)
    }

    /// Client id for application principals.
    #[must_use]
    pub fn app_id(&self) -> Option<Uuid> {
        match self {
            Self::App(a) => Some(a.client_id),
            _ => None,
        }
    }
}

/// Which claim shape produced a [`Principal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    App,
    Bundle,
}
