use async_trait::async_trait;
use http::HeaderValue;
use tollgate_core::{AuditRecord, Group, UsageRecord};
use uuid::Uuid;

/// Read-only parameter store holding deployment secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the decrypted value of the secret called `name`.
    async fn get_secret(&self, name: &str) -> anyhow::Result<String>;
}

/// Persistent, append-only store for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Write a single record into `table`.
    async fn put_record(&self, table: &str, record: &AuditRecord) -> anyhow::Result<()>;
}

/// Message queue receiving usage records. The queue is bound at construction.
#[async_trait]
pub trait UsageQueue: Send + Sync {
    /// Enqueue a single record as its string-typed attributes.
    async fn enqueue(&self, record: &UsageRecord) -> anyhow::Result<()>;
}

/// External service asserting which authorization groups a caller holds.
#[async_trait]
pub trait EntitlementSource: Send + Sync {
    /// Fetch the caller's groups, forwarding their raw `Authorization` header
    /// value and tenant id.
    async fn fetch_groups(
        &self,
        url: &str,
        authorization: &HeaderValue,
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<Group>>;
}
