//! Lazily built, cached issuer client.

use std::sync::Arc;
use tokio::sync::RwLock;

use super::config_store::load_config;
use super::BackendError;
use crate::issuer::{CredentialIssuer, IssuerFactory};
use crate::storage::Storage;

/// Holds at most one issuer client, built from the stored configuration on
/// first use and dropped whenever the configuration changes.
pub struct IssuerCache {
    factory: Arc<dyn IssuerFactory>,
    client: RwLock<Option<Arc<dyn CredentialIssuer>>>,
}

impl IssuerCache {
    pub fn new(factory: Arc<dyn IssuerFactory>) -> Self {
        Self {
            factory,
            client: RwLock::new(None),
        }
    }

    async fn cached(&self) -> Option<Arc<dyn CredentialIssuer>> {
        self.client.read().await.clone()
    }

    /// Return the cached client, building it if needed.
    ///
    /// Concurrent first callers collapse into a single construction: the
    /// write lock is re-checked before building.
    pub async fn get_or_construct(
        &self,
        storage: &dyn Storage,
    ) -> Result<Arc<dyn CredentialIssuer>, BackendError> {
        if let Some(client) = self.cached().await {
            return Ok(client);
        }

        let mut slot = self.client.write().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let config = load_config(storage).await?;
        let client = self
            .factory
            .build(config.as_ref())
            .map_err(|e| BackendError::Configuration(e.to_string()))?;
        tracing::debug!("Built issuer client");

        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Forget the cached client so the next use rebuilds it.
    pub async fn invalidate(&self) {
        let mut slot = self.client.write().await;
        if slot.take().is_some() {
            tracing::debug!("Reset issuer client");
        }
    }
}
