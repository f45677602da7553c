//! Credential issuance (`creds/<role>` path).
//!
//! Single-use roles mint a fresh key on every request and never touch role
//! state. Multi-use roles move between two states under the role lock:
//!
//! ```text
//!   Empty (usage_count == 0) ── request: mint, cache, count = 1 ──► Active
//!   Active                   ── request: count += 1              ──► Active
//!   Active                   ── last revoke: clear, delete        ──► Empty
//! ```

use chrono::Utc;
use tracing::{debug, info, warn};

use super::secret::{CredentialData, InternalData, LeaseOptions, SecretResponse};
use super::template::{self, TemplateVars};
use super::{
    normalize_role_name, Backend, BackendError, RequestContext, ReuseMode, Role,
    CCLOUD_API_KEY_SECRET_TYPE, DEFAULT_DESCRIPTION_TEMPLATE, DEFAULT_DISPLAY_NAME_TEMPLATE,
};
use crate::issuer::{CreateKeyRequest, IssuedKey};

impl Backend {
    /// Issue a credential for `role_name`.
    pub async fn request_credential(
        &self,
        ctx: &RequestContext,
        role_name: &str,
    ) -> Result<SecretResponse, BackendError> {
        let name = normalize_role_name(role_name)?;
        let role = self.require_role(&name).await?;

        match role.reuse_mode {
            ReuseMode::SingleUse => {
                let key = self.mint(ctx, &name, &role).await?;
                info!(role = %name, key_id = %key.id, "Issued single-use API key");
                Ok(secret_response(&name, &role, key))
            }
            ReuseMode::MultiUse => self.request_shared_credential(ctx, &name).await,
        }
    }

    async fn request_shared_credential(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<SecretResponse, BackendError> {
        let _guard = self.locks.lock(name).await;

        // Re-read under the lock; the role may have changed while we waited.
        let mut role = self.require_role(name).await?;
        if !role.reuse_mode.is_multi_use() {
            let key = self.mint(ctx, name, &role).await?;
            info!(role = %name, key_id = %key.id, "Issued single-use API key");
            return Ok(secret_response(name, &role, key));
        }

        if role.usage_count > 0 && role.has_cached_key() {
            role.usage_count = role.usage_count.saturating_add(1);
            self.set_role(name, &role).await?;
            debug!(role = %name, key_id = %role.cached_key_id, usage_count = role.usage_count, "Reusing shared API key");
            let key = IssuedKey {
                id: role.cached_key_id.clone(),
                secret: role.cached_key_secret.clone(),
            };
            return Ok(secret_response(name, &role, key));
        }

        let key = self.mint(ctx, name, &role).await?;
        role.cached_key_id = key.id.clone();
        role.cached_key_secret = key.secret.clone();
        role.usage_count = 1;

        if let Err(e) = self.set_role(name, &role).await {
            warn!(role = %name, key_id = %key.id, error = %e, "Failed to store shared key; deleting it");
            if let Ok(client) = self.client.get_or_construct(self.storage.as_ref()).await {
                if let Err(del) = client.delete_key(&key.id).await {
                    warn!(key_id = %key.id, error = %del, "Failed to delete unstored API key");
                }
            }
            return Err(e);
        }

        info!(role = %name, key_id = %key.id, "Issued shared API key");
        Ok(secret_response(name, &role, key))
    }

    /// Create one key pair for `role` through the issuer.
    async fn mint(
        &self,
        ctx: &RequestContext,
        name: &str,
        role: &Role,
    ) -> Result<IssuedKey, BackendError> {
        let client = self.client.get_or_construct(self.storage.as_ref()).await?;

        let vars = TemplateVars {
            role_name: name.to_string(),
            display_name: ctx.display_name.clone(),
            path: format!("{}{}", ctx.mount_point, ctx.path),
            unix_time: Utc::now().timestamp(),
        };
        let display_name = template::render(
            role.display_name_template
                .as_deref()
                .unwrap_or(DEFAULT_DISPLAY_NAME_TEMPLATE),
            &vars,
        )
        .map_err(BackendError::Validation)?;
        let description = template::render(
            role.description_template
                .as_deref()
                .unwrap_or(DEFAULT_DESCRIPTION_TEMPLATE),
            &vars,
        )
        .map_err(BackendError::Validation)?;

        let request = CreateKeyRequest {
            owner: role.owner.clone(),
            owner_env: role.owner_env.clone(),
            resource: role.resource.clone(),
            resource_env: role.resource_env.clone(),
            display_name,
            description,
        };
        let key = client
            .create_key(&request)
            .await
            .map_err(|e| BackendError::Issuance(e.to_string()))?;

        if key.id.is_empty() || key.secret.is_empty() {
            return Err(BackendError::Issuance(
                "received an invalid CCloud API key".to_string(),
            ));
        }
        Ok(key)
    }
}

fn secret_response(name: &str, role: &Role, key: IssuedKey) -> SecretResponse {
    SecretResponse {
        secret_type: CCLOUD_API_KEY_SECRET_TYPE,
        internal: InternalData {
            key_id: key.id.clone(),
            role: name.to_string(),
            multi_use: role.reuse_mode.is_multi_use(),
        },
        data: CredentialData::new(key.id, key.secret, &role.resource),
        lease: LeaseOptions::from_role(role),
    }
}
