//! Append-only records emitted by the pipeline.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One externally originated, tenant-attributed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Request correlation id.
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: String,
    pub url: String,
    pub method: String,
    pub client_ip: String,
    pub status_code: u16,
    pub created_at: DateTime<Utc>,
    pub process_time: Duration,
}

/// Names of the string attributes a usage message carries.
pub mod attributes {
    pub const PRODUCT_ID: &str = "product_id";
    pub const TENANT_ID: &str = "tenant_id";
    pub const MEMORY_MB: &str = "memory_mb";
    pub const START_TIMESTAMP: &str = "start_timestamp";
    pub const END_TIMESTAMP: &str = "end_timestamp";
    pub const WORKFLOW: &str = "workflow";
}

/// Metering entry for one tenant-attributed call, internal or external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub product_id: Uuid,
    pub tenant_id: Uuid,
    /// Memory size descriptor of the deployment, e.g. `"1024"`.
    pub memory_mb: String,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    /// Request path of the metered call.
    pub workflow: String,
}

impl UsageRecord {
    /// The record as the six string-typed message attributes the usage queue
    /// consumer expects.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            (attributes::PRODUCT_ID, self.product_id.to_string()),
            (attributes::TENANT_ID, self.tenant_id.to_string()),
            (attributes::MEMORY_MB, self.memory_mb.clone()),
            (attributes::START_TIMESTAMP, self.start_timestamp.to_rfc3339()),
            (attributes::END_TIMESTAMP, self.end_timestamp.to_rfc3339()),
            (attributes::WORKFLOW, self.workflow.clone()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn usage_attributes_are_complete() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = UsageRecord {
            product_id: Uuid::parse_str("40bb5b9b-0b3d-40f0-932f-2969200660d5").unwrap(),
            tenant_id: Uuid::parse_str("dd49bb44-ac56-4e70-8697-89603f4125f2").unwrap(),
            memory_mb: "1234".to_string(),
            start_timestamp: start,
            end_timestamp: start + chrono::Duration::milliseconds(15),
            workflow: "/workflows/run".to_string(),
        };

        let attrs = record.attributes();
        assert_eq!(attrs.len(), 6);
        assert_eq!(attrs["product_id"], "40bb5b9b-0b3d-40f0-932f-2969200660d5");
        assert_eq!(attrs["tenant_id"], "dd49bb44-ac56-4e70-8697-89603f4125f2");
        assert_eq!(attrs["memory_mb"], "1234");
        assert_eq!(attrs["start_timestamp"], "2024-05-01T12:00:00+00:00");
        assert_eq!(attrs["end_timestamp"], "2024-05-01T12:00:00.015+00:00");
        assert_eq!(attrs["workflow"], "/workflows/run");
    }
}
