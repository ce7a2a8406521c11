//! In-memory implementations of the external collaborators.
//!
//! Used by tests and the demo server. Each store records what it was asked
//! to do and can be built to fail every call with a fixed message.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use http::HeaderValue;
use parking_lot::Mutex;
use tollgate_core::{AuditRecord, Group, UsageRecord};
use uuid::Uuid;

use crate::traits::{AuditSink, EntitlementSource, SecretStore, UsageQueue};

fn failure(message: Option<&String>) -> anyhow::Result<()> {
    match message {
        Some(message) => Err(anyhow::anyhow!("{message}")),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// MemorySecretStore
// ---------------------------------------------------------------------------

/// Fixed name-to-value secret map.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: HashMap<String, String>,
}

impl MemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get_secret(&self, name: &str) -> anyhow::Result<String> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("parameter {name} not found"))
    }
}

// ---------------------------------------------------------------------------
// MemoryAuditSink
// ---------------------------------------------------------------------------

/// Keeps written audit records alongside their table name.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<(String, AuditRecord)>>,
    attempts: AtomicUsize,
    failure: Option<String>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn records(&self) -> Vec<(String, AuditRecord)> {
        self.records.lock().clone()
    }

    /// Writes attempted, including failed ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn put_record(&self, table: &str, record: &AuditRecord) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        failure(self.failure.as_ref())?;
        self.records.lock().push((table.to_string(), record.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryUsageQueue
// ---------------------------------------------------------------------------

/// Named queue holding enqueued usage records and their message attributes.
#[derive(Debug)]
pub struct MemoryUsageQueue {
    name: String,
    records: Mutex<Vec<UsageRecord>>,
    messages: Mutex<Vec<BTreeMap<&'static str, String>>>,
    attempts: AtomicUsize,
    failure: Option<String>,
}

impl MemoryUsageQueue {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            failure: None,
        }
    }

    /// A queue whose every enqueue fails with `message`.
    #[must_use]
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().clone()
    }

    /// Enqueued messages as the string attributes a consumer would read.
    #[must_use]
    pub fn messages(&self) -> Vec<BTreeMap<&'static str, String>> {
        self.messages.lock().clone()
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UsageQueue for MemoryUsageQueue {
    async fn enqueue(&self, record: &UsageRecord) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        failure(self.failure.as_ref())?;
        self.messages.lock().push(record.attributes());
        self.records.lock().push(record.clone());
        tracing::trace!(queue = %self.name, tenant_id = %record.tenant_id, "usage message stored");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StaticEntitlementSource
// ---------------------------------------------------------------------------

/// Grants every caller the same fixed set of groups.
#[derive(Debug, Default)]
pub struct StaticEntitlementSource {
    groups: Vec<Group>,
    lookups: Mutex<Vec<(String, HeaderValue, Uuid)>>,
    failure: Option<String>,
}

impl StaticEntitlementSource {
    #[must_use]
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups.into_iter().map(|name| Group { name: name.into() }).collect(),
            ..Self::default()
        }
    }

    /// A source whose every lookup fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// `(url, authorization, tenant_id)` of every lookup, in call order.
    #[must_use]
    pub fn lookups(&self) -> Vec<(String, HeaderValue, Uuid)> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl EntitlementSource for StaticEntitlementSource {
    async fn fetch_groups(
        &self,
        url: &str,
        authorization: &HeaderValue,
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<Group>> {
        self.lookups
            .lock()
            .push((url.to_string(), authorization.clone(), tenant_id));
        failure(self.failure.as_ref())?;
        Ok(self.groups.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn secret_store_reports_missing_names() {
        let store = MemorySecretStore::new().with_secret("AUTH_JWT_PUBLIC_KEY_TEST", "secret");
        assert_eq!(store.get_secret("AUTH_JWT_PUBLIC_KEY_TEST").await.unwrap(), "secret");

        let err = store.get_secret("AUTH_JWT_PUBLIC_KEY_PROD").await.unwrap_err();
        assert_eq!(err.to_string(), "parameter AUTH_JWT_PUBLIC_KEY_PROD not found");
    }

    #[tokio::test]
    async fn usage_queue_keeps_message_attributes() {
        let queue = MemoryUsageQueue::new("usage-queue-test");
        let now = Utc::now();
        let record = UsageRecord {
            product_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            memory_mb: "512".to_string(),
            start_timestamp: now,
            end_timestamp: now,
            workflow: "/run".to_string(),
        };
        queue.enqueue(&record).await.unwrap();

        let messages = queue.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["memory_mb"], "512");
        assert_eq!(messages[0]["workflow"], "/run");
        assert_eq!(queue.name(), "usage-queue-test");
    }

    #[tokio::test]
    async fn failing_stores_count_attempts() {
        let sink = MemoryAuditSink::failing("foo dynamo");
        let record = AuditRecord {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            user_id: "foo@bar.com".to_string(),
            url: "/".to_string(),
            method: "GET".to_string(),
            client_ip: "1.1.1.1".to_string(),
            status_code: 200,
            created_at: Utc::now(),
            process_time: std::time::Duration::from_millis(3),
        };
        let err = sink.put_record("table", &record).await.unwrap_err();
        assert_eq!(err.to_string(), "foo dynamo");
        assert_eq!(sink.attempts(), 1);
        assert!(sink.records().is_empty());

        let queue = MemoryUsageQueue::failing("usage-queue-test", "foo sqs");
        let usage = UsageRecord {
            product_id: Uuid::new_v4(),
            tenant_id: record.tenant_id,
            memory_mb: "512".to_string(),
            start_timestamp: record.created_at,
            end_timestamp: record.created_at,
            workflow: "/".to_string(),
        };
        for _ in 0..2 {
            assert!(queue.enqueue(&usage).await.is_err());
        }
        assert_eq!(queue.attempts(), 2);
        assert!(queue.records().is_empty());
    }
}
