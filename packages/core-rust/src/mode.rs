use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deployment tier. Selects the signing-key secret, the usage queue and the
/// default entitlement service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    Test,
    Dev,
    Prod,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown build mode {0:?}, expected one of test, dev, prod")]
pub struct ModeError(pub String);

impl BuildMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }

    /// Name of the secret holding the token signing key.
    #[must_use]
    pub fn signing_key_name(self) -> &'static str {
        match self {
            Self::Test => "AUTH_JWT_PUBLIC_KEY_TEST",
            Self::Dev => "AUTH_JWT_PUBLIC_KEY_DEV",
            Self::Prod => "AUTH_JWT_PUBLIC_KEY_PROD",
        }
    }

    #[must_use]
    pub fn usage_queue_name(self) -> &'static str {
        match self {
            Self::Test => "daas-service-cost-handler-usage-queue-test",
            Self::Dev => "daas-service-cost-handler-usage-queue-dev",
            Self::Prod => "daas-service-cost-handler-usage-queue-prod",
        }
    }

    /// Default entitlement service URL. Test deployments have none.
    #[must_use]
    pub fn entitlement_url(self) -> Option<&'static str> {
        match self {
            Self::Test => None,
            Self::Dev => Some("https://grasp-daas.com/api/entitlements-dev/v1/groups/"),
            Self::Prod => Some("https://grasp-daas.com/api/entitlements/v1/groups/"),
        }
    }
}

impl FromStr for BuildMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Self::Test),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(ModeError(other.to_string())),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
