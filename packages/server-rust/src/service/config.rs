use http::header::HeaderName;
use tollgate_core::{BuildMode, ClaimsEncoding, RoleRequirement};
use uuid::Uuid;

use super::error::ConfigError;

/// Header carrying the request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";
/// Header carrying the originating client address.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
/// Response header with the handler's processing time.
pub const X_PROCESS_TIME: &str = "x-process-time";
/// Header forwarding the caller's tenant to the entitlement service.
pub const TENANT_ID: &str = "tenant-id";

/// Settings of the pipeline entry stage.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Request header holding the correlation UUID.
    pub correlation_header: HeaderName,
    /// Canonical claim encoding of this deployment.
    pub encoding: ClaimsEncoding,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            correlation_header: HeaderName::from_static(X_REQUEST_ID),
            encoding: ClaimsEncoding::Nested,
        }
    }
}

/// Settings of the audit stage.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    table: String,
    source_ip_header: HeaderName,
}

impl AuditConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyAuditTable`] for an empty table name.
    pub fn new(table: impl Into<String>) -> Result<Self, ConfigError> {
        let table = table.into();
        if table.is_empty() {
            return Err(ConfigError::EmptyAuditTable);
        }
        Ok(Self {
            table,
            source_ip_header: HeaderName::from_static(X_FORWARDED_FOR),
        })
    }

    #[must_use]
    pub fn with_source_ip_header(mut self, header: HeaderName) -> Self {
        self.source_ip_header = header;
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn source_ip_header(&self) -> &HeaderName {
        &self.source_ip_header
    }
}

/// Settings of the usage stage. Fixed per deployment.
#[derive(Debug, Clone)]
pub struct UsageConfig {
    product_id: Uuid,
    memory_mb: String,
}

impl UsageConfig {
    /// # Errors
    ///
    /// Fails fast on a nil product id or an empty memory descriptor.
    pub fn new(product_id: Uuid, memory_mb: impl Into<String>) -> Result<Self, ConfigError> {
        let memory_mb = memory_mb.into();
        if product_id.is_nil() {
            return Err(ConfigError::NilProductId);
        }
        if memory_mb.is_empty() {
            return Err(ConfigError::EmptyMemoryDescriptor);
        }
        Ok(Self {
            product_id,
            memory_mb,
        })
    }

    #[must_use]
    pub fn product_id(&self) -> Uuid {
        self.product_id
    }

    #[must_use]
    pub fn memory_mb(&self) -> &str {
        &self.memory_mb
    }
}

/// Usage queue for `mode`, unless an explicit queue name overrides it.
#[must_use]
pub fn usage_queue_name(mode: BuildMode, override_name: Option<&str>) -> String {
    override_name
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| mode.usage_queue_name())
        .to_string()
}

/// Settings of the entitlement stage.
#[derive(Debug, Clone)]
pub struct EntitlementConfig {
    roles: RoleRequirement,
    url: String,
}

impl EntitlementConfig {
    /// Resolves unset fields: default roles when `roles` is empty, the build
    /// mode's service URL when `url` is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEntitlementUrl`] when no URL is given and
    /// the mode has no default.
    pub fn resolve(
        roles: Vec<String>,
        url: Option<String>,
        mode: BuildMode,
    ) -> Result<Self, ConfigError> {
        let url = match url.filter(|u| !u.is_empty()) {
            Some(url) => url,
            None => mode
                .entitlement_url()
                .ok_or(ConfigError::MissingEntitlementUrl(mode))?
                .to_string(),
        };
        Ok(Self {
            roles: RoleRequirement::new(roles),
            url,
        })
    }

    #[must_use]
    pub fn roles(&self) -> &RoleRequirement {
        &self.roles
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}
