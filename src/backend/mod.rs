//! Secrets backend: configuration, roles, and the credential lifecycle.
//!
//! ## Architecture
//!
//! ```text
//!   creds/<role> ──► request_credential ──► Role Store ──► Storage
//!                          │
//!                          ▼
//!                    IssuerCache ──► CredentialIssuer (create)
//!
//!   lease revoke ──► revoke ──► Role Store (usage count) ──► CredentialIssuer (delete)
//! ```
//!
//! Persisted keys are `config` and `role/<name>`; nothing else is written.
//!
//! Role read-modify-write is serialized per role inside this process only.
//! The storage layer has no compare-and-swap, so two processes sharing one
//! store can still race on the same role.

mod client;
mod config_store;
mod error;
mod lifecycle;
mod locks;
mod revoke;
mod roles;
mod secret;
mod template;

#[cfg(test)]
pub(crate) mod testing;

pub use client::IssuerCache;
pub use config_store::{ConfigFields, CONFIG_STORAGE_PATH};
pub use error::BackendError;
pub use roles::{normalize_role_name, ReuseMode, Role, RoleFields, ROLE_STORAGE_PREFIX};
pub use secret::{
    CredentialData, InternalData, LeaseOptions, RenewResponse, SecretResponse,
    CCLOUD_API_KEY_SECRET_TYPE,
};
pub use template::{DEFAULT_DESCRIPTION_TEMPLATE, DEFAULT_DISPLAY_NAME_TEMPLATE};

use std::sync::Arc;

use crate::issuer::IssuerFactory;
use crate::storage::SharedStorage;
use locks::RoleLocks;

/// Whether a write creates a new entry or updates an existing one.
///
/// Creates enforce required fields; updates merge only what was provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Create,
    Update,
}

/// Caller details recorded in the description of minted keys.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Mount point of this backend, e.g. `ccloud/`.
    pub mount_point: String,
    /// Request path relative to the mount, e.g. `creds/orders`.
    pub path: String,
    /// Display name of the requesting entity.
    pub display_name: String,
}

/// The secrets backend. One instance owns the storage handle, the cached
/// issuer client, and the per-role locks.
pub struct Backend {
    storage: SharedStorage,
    client: IssuerCache,
    locks: RoleLocks,
}

impl Backend {
    pub fn new(storage: SharedStorage, factory: Arc<dyn IssuerFactory>) -> Self {
        Self {
            storage,
            client: IssuerCache::new(factory),
            locks: RoleLocks::default(),
        }
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Drop cached state derived from `key` after it changed underneath us.
    pub async fn invalidate(&self, key: &str) {
        if key == CONFIG_STORAGE_PATH {
            self.client.invalidate().await;
        }
    }
}
