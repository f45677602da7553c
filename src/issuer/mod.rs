//! Credential issuer boundary.
//!
//! A [`CredentialIssuer`] mints and deletes API key pairs against the
//! external cloud API. The backend never talks HTTP directly; it builds an
//! issuer through an [`IssuerFactory`] from the stored [`IssuerConfig`].

mod ccloud;

pub use ccloud::{CCloudClient, CCloudIssuerFactory, DEFAULT_API_URL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Minimum configuration required to build an issuer client.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
    pub api_key_id: String,
    pub api_key_secret: String,
    #[serde(default)]
    pub url: String,
}

impl std::fmt::Debug for IssuerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerConfig")
            .field("api_key_id", &self.api_key_id)
            .field("api_key_secret", &"<redacted>")
            .field("url", &self.url)
            .finish()
    }
}

/// Errors from building or calling an issuer.
#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("{0}")]
    Config(String),

    #[error("request to issuer failed: {0}")]
    Request(String),

    #[error("issuer returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse issuer response: {0}")]
    Decode(String),
}

/// Parameters for minting one key pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateKeyRequest {
    pub owner: String,
    pub owner_env: String,
    pub resource: String,
    pub resource_env: String,
    pub display_name: String,
    pub description: String,
}

/// A freshly minted key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedKey {
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for IssuedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedKey")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Mints and deletes credentials against the external API.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Create a key pair owned by `request.owner`, scoped to `request.resource`
    /// (or cloud-wide when the resource is empty).
    async fn create_key(&self, request: &CreateKeyRequest) -> Result<IssuedKey, IssuerError>;

    /// Delete a key pair. Deleting a key that no longer exists succeeds.
    async fn delete_key(&self, key_id: &str) -> Result<(), IssuerError>;
}

/// Builds issuer clients from configuration.
pub trait IssuerFactory: Send + Sync {
    fn build(&self, config: Option<&IssuerConfig>) -> Result<Arc<dyn CredentialIssuer>, IssuerError>;
}

/// Check that `config` is present and carries both key fields.
pub fn validate_config(config: Option<&IssuerConfig>) -> Result<&IssuerConfig, IssuerError> {
    let config = config.ok_or_else(|| IssuerError::Config("client configuration nil".to_string()))?;
    if config.api_key_id.is_empty() {
        return Err(IssuerError::Config(
            "CCloud API key ID not defined".to_string(),
        ));
    }
    if config.api_key_secret.is_empty() {
        return Err(IssuerError::Config(
            "CCloud API key secret not defined".to_string(),
        ));
    }
    Ok(config)
}
