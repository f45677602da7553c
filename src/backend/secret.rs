//! Credential secret type and the data carried by issued leases.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Role;

pub const CCLOUD_API_KEY_SECRET_TYPE: &str = "ccloud_cluster_apikey";

/// Resource id prefix of Kafka clusters.
const KAFKA_CLUSTER_PREFIX: &str = "lkc-";

/// Data attached to a lease and handed back on revoke/renew.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalData {
    pub key_id: String,
    pub role: String,
    /// Mode of the role when the key was issued. Leases written before this
    /// field existed decode as single-use.
    #[serde(default)]
    pub multi_use: bool,
}

/// Credential returned to the caller.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialData {
    pub key_id: String,
    pub secret: String,
    /// Ready-made JAAS line for Kafka clients, present for cluster-scoped keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_jaas_config: Option<String>,
}

impl std::fmt::Debug for CredentialData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialData")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl CredentialData {
    pub fn new(key_id: String, secret: String, resource: &str) -> Self {
        let sasl_jaas_config = resource.starts_with(KAFKA_CLUSTER_PREFIX).then(|| {
            format!(
                "org.apache.kafka.common.security.plain.PlainLoginModule required username=\"{}\" password=\"{}\";",
                key_id, secret
            )
        });
        Self {
            key_id,
            secret,
            sasl_jaas_config,
        }
    }
}

/// Lease bounds requested for a credential. `None` defers to the lease
/// manager's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ttl: Option<Duration>,
}

impl LeaseOptions {
    pub fn from_role(role: &Role) -> Self {
        let non_zero = |d: Duration| (!d.is_zero()).then_some(d);
        Self {
            ttl: non_zero(role.ttl),
            max_ttl: non_zero(role.max_ttl),
        }
    }
}

/// A freshly issued credential with its lease data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretResponse {
    pub secret_type: &'static str,
    pub data: CredentialData,
    pub internal: InternalData,
    pub lease: LeaseOptions,
}

/// Result of renewing a lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenewResponse {
    pub internal: InternalData,
    pub lease: LeaseOptions,
}
