//! Role store (`role/<name>` paths).
//!
//! A role is a named policy describing who owns minted keys, which resource
//! they are scoped to, the lease bounds, and whether one key is shared
//! between requests. Multi-use roles also carry the cached key and its usage
//! count; that state is owned by the credential lifecycle and survives role
//! updates.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use super::template;
use super::{Backend, BackendError, WriteOperation};
use crate::storage::StorageEntry;
use crate::util::{deserialize_opt_duration, duration_secs};

pub const ROLE_STORAGE_PREFIX: &str = "role/";

/// Whether a role mints a key per request or shares one cached key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum ReuseMode {
    /// Every request mints a fresh key with its own lease.
    #[default]
    SingleUse,
    /// Requests share one cached key, reference counted by `usage_count`.
    MultiUse,
}

impl ReuseMode {
    pub fn is_multi_use(self) -> bool {
        self == Self::MultiUse
    }
}

impl From<bool> for ReuseMode {
    fn from(multi_use: bool) -> Self {
        if multi_use {
            Self::MultiUse
        } else {
            Self::SingleUse
        }
    }
}

impl From<ReuseMode> for bool {
    fn from(mode: ReuseMode) -> Self {
        mode.is_multi_use()
    }
}

/// A stored role.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub owner: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner_env: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_env: String,

    #[serde(default, with = "duration_secs", skip_serializing_if = "Duration::is_zero")]
    pub ttl: Duration,
    #[serde(default, with = "duration_secs", skip_serializing_if = "Duration::is_zero")]
    pub max_ttl: Duration,

    #[serde(default, rename = "multi_use_key")]
    pub reuse_mode: ReuseMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_template: Option<String>,

    #[serde(default, rename = "cc_key_id", skip_serializing_if = "String::is_empty")]
    pub cached_key_id: String,
    #[serde(default, rename = "cc_key_secret", skip_serializing_if = "String::is_empty")]
    pub cached_key_secret: String,
    #[serde(default)]
    pub usage_count: u32,
}

impl std::fmt::Debug for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Role")
            .field("owner", &self.owner)
            .field("owner_env", &self.owner_env)
            .field("resource", &self.resource)
            .field("resource_env", &self.resource_env)
            .field("ttl", &self.ttl)
            .field("max_ttl", &self.max_ttl)
            .field("reuse_mode", &self.reuse_mode)
            .field("cached_key_id", &self.cached_key_id)
            .field("usage_count", &self.usage_count)
            .finish_non_exhaustive()
    }
}

impl Role {
    /// True when a shared key is cached on the role.
    pub fn has_cached_key(&self) -> bool {
        !self.cached_key_id.is_empty() && !self.cached_key_secret.is_empty()
    }

    /// Forget the cached key.
    pub(crate) fn clear_cached_key(&mut self) {
        self.cached_key_id.clear();
        self.cached_key_secret.clear();
    }

    /// Response data for a role read. Never includes the cached secret.
    pub fn to_response_data(&self) -> serde_json::Value {
        json!({
            "owner": self.owner,
            "owner_env": self.owner_env,
            "resource": self.resource,
            "resource_env": self.resource_env,
            "ttl": self.ttl.as_secs(),
            "max_ttl": self.max_ttl.as_secs(),
            "multi_use_key": self.reuse_mode.is_multi_use(),
            "display_name_template": self.display_name_template.clone().unwrap_or_default(),
            "description_template": self.description_template.clone().unwrap_or_default(),
            "usage_count": self.usage_count,
        })
    }
}

/// Fields accepted by a role write. Absent fields are left alone on update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleFields {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub owner_env: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub resource_env: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub ttl: Option<Duration>,
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub max_ttl: Option<Duration>,
    #[serde(default)]
    pub multi_use_key: Option<bool>,
    #[serde(default)]
    pub display_name_template: Option<String>,
    #[serde(default)]
    pub description_template: Option<String>,
}

/// Trim and lower-case a role name; empty names are rejected.
pub fn normalize_role_name(name: &str) -> Result<String, BackendError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(BackendError::missing_role_name());
    }
    Ok(name)
}

fn storage_key(name: &str) -> String {
    format!("{}{}", ROLE_STORAGE_PREFIX, name)
}

/// Apply a required string field: set when provided, fail on create when absent.
fn merge_required(
    target: &mut String,
    value: Option<String>,
    field: &str,
    create: bool,
) -> Result<(), BackendError> {
    match value {
        Some(value) => {
            *target = value;
            Ok(())
        }
        None if create => Err(BackendError::Validation(format!(
            "missing {} in role",
            field
        ))),
        None => Ok(()),
    }
}

/// Apply an optional template field; an empty string resets to the default.
fn merge_template(target: &mut Option<String>, value: Option<String>) -> Result<(), BackendError> {
    if let Some(value) = value {
        if value.is_empty() {
            *target = None;
        } else {
            template::validate(&value).map_err(BackendError::Validation)?;
            *target = Some(value);
        }
    }
    Ok(())
}

impl Backend {
    /// Load a role by (already normalized) name.
    pub async fn get_role(&self, name: &str) -> Result<Option<Role>, BackendError> {
        if name.is_empty() {
            return Err(BackendError::missing_role_name());
        }
        match self.storage.get(&storage_key(name)).await? {
            Some(entry) => Ok(Some(entry.decode_json()?)),
            None => Ok(None),
        }
    }

    /// Load a role that must exist.
    pub(crate) async fn require_role(&self, name: &str) -> Result<Role, BackendError> {
        self.get_role(name)
            .await?
            .ok_or_else(BackendError::role_not_found)
    }

    /// Persist a role.
    pub async fn set_role(&self, name: &str, role: &Role) -> Result<(), BackendError> {
        let entry = StorageEntry::json(storage_key(name), role)?;
        self.storage.put(entry).await?;
        Ok(())
    }

    /// Read a role for the `role/<name>` path.
    pub async fn read_role(&self, name: &str) -> Result<Option<Role>, BackendError> {
        let name = normalize_role_name(name)?;
        self.get_role(&name).await
    }

    /// List role names in storage order.
    pub async fn list_roles(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.storage.list(ROLE_STORAGE_PREFIX).await?)
    }

    /// Whether a role with this name is stored.
    pub async fn role_exists(&self, name: &str) -> Result<bool, BackendError> {
        let name = normalize_role_name(name)?;
        Ok(self.get_role(&name).await?.is_some())
    }

    /// Create or update a role from the provided fields.
    ///
    /// The ttl/max_ttl bound is checked after merging, so an update that only
    /// changes `ttl` is validated against the stored `max_ttl`.
    pub async fn write_role(
        &self,
        name: &str,
        fields: RoleFields,
        op: WriteOperation,
    ) -> Result<Role, BackendError> {
        let name = normalize_role_name(name)?;
        let create = op == WriteOperation::Create;

        let _guard = self.locks.lock(&name).await;
        let mut role = self.get_role(&name).await?.unwrap_or_default();

        merge_required(&mut role.owner, fields.owner, "owner", create)?;
        merge_required(&mut role.owner_env, fields.owner_env, "owner_env", create)?;
        merge_required(&mut role.resource, fields.resource, "resource", create)?;
        merge_required(&mut role.resource_env, fields.resource_env, "resource_env", create)?;

        match fields.ttl {
            Some(ttl) => role.ttl = ttl,
            None if create => role.ttl = Duration::ZERO,
            None => {}
        }
        match fields.max_ttl {
            Some(max_ttl) => role.max_ttl = max_ttl,
            None if create => role.max_ttl = Duration::ZERO,
            None => {}
        }

        if let Some(multi_use) = fields.multi_use_key {
            let mode = ReuseMode::from(multi_use);
            if mode != role.reuse_mode && role.usage_count > 0 {
                // Outstanding leases still reference the cached key and will
                // release it through the normal revocation path.
                warn!(
                    role = %name,
                    usage_count = role.usage_count,
                    "Changing reuse mode of a role with an active shared key"
                );
            }
            role.reuse_mode = mode;
        }

        merge_template(&mut role.display_name_template, fields.display_name_template)?;
        merge_template(&mut role.description_template, fields.description_template)?;

        if !role.ttl.is_zero() && !role.max_ttl.is_zero() && role.ttl > role.max_ttl {
            return Err(BackendError::Validation(
                "ttl cannot be greater than max_ttl".to_string(),
            ));
        }

        self.set_role(&name, &role).await?;
        info!(role = %name, ?op, multi_use = role.reuse_mode.is_multi_use(), "Stored role");
        Ok(role)
    }

    /// Delete a role.
    ///
    /// Keys already issued for the role are not revoked; their leases still
    /// carry enough data to delete them remotely when they expire.
    pub async fn delete_role(&self, name: &str) -> Result<(), BackendError> {
        let name = normalize_role_name(name)?;
        {
            let _guard = self.locks.lock(&name).await;
            if let Some(role) = self.get_role(&name).await? {
                if role.usage_count > 0 {
                    warn!(
                        role = %name,
                        key_id = %role.cached_key_id,
                        usage_count = role.usage_count,
                        "Deleting role with an active shared key; the key is not revoked"
                    );
                }
            }
            self.storage.delete(&storage_key(&name)).await?;
        }
        self.locks.forget(&name).await;
        info!(role = %name, "Deleted role");
        Ok(())
    }
}
