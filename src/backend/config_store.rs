//! Issuer configuration (`config` path).

use serde::Deserialize;
use tracing::info;

use super::{Backend, BackendError, WriteOperation};
use crate::issuer::IssuerConfig;
use crate::storage::{Storage, StorageEntry, StorageError};

pub const CONFIG_STORAGE_PATH: &str = "config";

/// Fields accepted by a configuration write. Absent fields are left alone on update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFields {
    #[serde(default, rename = "ccloud_api_key_id")]
    pub api_key_id: Option<String>,
    #[serde(default, rename = "ccloud_api_key_secret")]
    pub api_key_secret: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Load the stored issuer configuration, if any.
pub(crate) async fn load_config(storage: &dyn Storage) -> Result<Option<IssuerConfig>, StorageError> {
    match storage.get(CONFIG_STORAGE_PATH).await? {
        Some(entry) => entry.decode_json().map(Some),
        None => Ok(None),
    }
}

impl Backend {
    /// Read the stored configuration.
    pub async fn read_config(&self) -> Result<Option<IssuerConfig>, BackendError> {
        Ok(load_config(self.storage.as_ref()).await?)
    }

    /// Create or update the configuration, then reset the cached client so
    /// the next request picks up the new credentials.
    pub async fn write_config(
        &self,
        fields: ConfigFields,
        op: WriteOperation,
    ) -> Result<IssuerConfig, BackendError> {
        let create = op == WriteOperation::Create;

        let mut config = match self.read_config().await? {
            Some(config) => config,
            None if create => IssuerConfig::default(),
            None => {
                return Err(BackendError::NotFound(
                    "config not found during update operation".to_string(),
                ))
            }
        };

        match fields.api_key_id {
            Some(id) => config.api_key_id = id,
            None if create => {
                return Err(BackendError::Validation(
                    "missing ccloud_api_key_id in configuration".to_string(),
                ))
            }
            None => {}
        }
        match fields.api_key_secret {
            Some(secret) => config.api_key_secret = secret,
            None if create => {
                return Err(BackendError::Validation(
                    "missing ccloud_api_key_secret in configuration".to_string(),
                ))
            }
            None => {}
        }
        if let Some(url) = fields.url {
            config.url = url;
        }

        let entry = StorageEntry::json(CONFIG_STORAGE_PATH, &config)?;
        self.storage.put(entry).await?;
        self.invalidate(CONFIG_STORAGE_PATH).await;

        info!(api_key_id = %config.api_key_id, url = %config.url, "Stored issuer configuration");
        Ok(config)
    }

    /// Remove the configuration and reset the cached client.
    pub async fn delete_config(&self) -> Result<(), BackendError> {
        self.storage.delete(CONFIG_STORAGE_PATH).await?;
        self.invalidate(CONFIG_STORAGE_PATH).await;
        info!("Deleted issuer configuration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{empty_backend, test_config_fields};

    #[tokio::test]
    async fn test_create_requires_key_id() {
        let (backend, _, _) = empty_backend();
        let err = backend
            .write_config(
                ConfigFields {
                    api_key_secret: Some("secret".to_string()),
                    ..Default::default()
                },
                WriteOperation::Create,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
        assert_eq!(err.to_string(), "missing ccloud_api_key_id in configuration");
        assert!(backend.read_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_requires_key_secret() {
        let (backend, _, _) = empty_backend();
        let err = backend
            .write_config(
                ConfigFields {
                    api_key_id: Some("id".to_string()),
                    ..Default::default()
                },
                WriteOperation::Create,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "missing ccloud_api_key_secret in configuration"
        );
    }

    #[tokio::test]
    async fn test_create_then_read_returns_fields() {
        let (backend, _, _) = empty_backend();
        backend
            .write_config(test_config_fields(), WriteOperation::Create)
            .await
            .unwrap();

        let config = backend.read_config().await.unwrap().unwrap();
        assert_eq!(
            config,
            IssuerConfig {
                api_key_id: "cloud-key".to_string(),
                api_key_secret: "cloud-secret".to_string(),
                url: "https://ccloud.example".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing() {
        let (backend, _, _) = empty_backend();

        let err = backend
            .write_config(
                ConfigFields {
                    url: Some("https://other".to_string()),
                    ..Default::default()
                },
                WriteOperation::Update,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));

        backend
            .write_config(test_config_fields(), WriteOperation::Create)
            .await
            .unwrap();
        backend
            .write_config(
                ConfigFields {
                    url: Some("https://other".to_string()),
                    ..Default::default()
                },
                WriteOperation::Update,
            )
            .await
            .unwrap();

        let config = backend.read_config().await.unwrap().unwrap();
        assert_eq!(config.api_key_id, "cloud-key");
        assert_eq!(config.api_key_secret, "cloud-secret");
        assert_eq!(config.url, "https://other");
    }

    #[tokio::test]
    async fn test_write_and_delete_reset_cached_client() {
        let (backend, _, factory) = empty_backend();
        backend
            .write_config(test_config_fields(), WriteOperation::Create)
            .await
            .unwrap();

        backend.client.get_or_construct(backend.storage.as_ref()).await.unwrap();
        backend.client.get_or_construct(backend.storage.as_ref()).await.unwrap();
        assert_eq!(factory.builds(), 1);

        backend
            .write_config(
                ConfigFields {
                    api_key_secret: Some("rotated".to_string()),
                    ..Default::default()
                },
                WriteOperation::Update,
            )
            .await
            .unwrap();
        backend.client.get_or_construct(backend.storage.as_ref()).await.unwrap();
        assert_eq!(factory.builds(), 2);

        backend.delete_config().await.unwrap();
        assert!(backend.read_config().await.unwrap().is_none());
        let err = backend
            .client
            .get_or_construct(backend.storage.as_ref())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::Configuration(_)));
    }
}
