use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::HeaderValue;
use reqwest::Client;
use tollgate_core::Group;
use uuid::Uuid;

use crate::service::config::TENANT_ID;
use crate::traits::EntitlementSource;

/// Entitlement service reached over HTTP.
///
/// Issues `GET <url>` with the caller's `Authorization` value and a
/// `tenant-id` header, and expects a JSON array of `{"name": ...}` groups.
#[derive(Debug, Clone)]
pub struct HttpEntitlementSource {
    client: Client,
}

impl HttpEntitlementSource {
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build entitlement HTTP client")?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitlementSource for HttpEntitlementSource {
    async fn fetch_groups(
        &self,
        url: &str,
        authorization: &HeaderValue,
        tenant_id: Uuid,
    ) -> anyhow::Result<Vec<Group>> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, authorization.clone())
            .header(TENANT_ID, tenant_id.to_string())
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?;

        response
            .json::<Vec<Group>>()
            .await
            .context("failed to decode entitlement groups")
    }
}
