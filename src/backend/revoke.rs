//! Lease revocation and renewal for issued credentials.

use tracing::{debug, info, warn};

use super::secret::{InternalData, LeaseOptions, RenewResponse};
use super::{Backend, BackendError};
use crate::issuer::CredentialIssuer;

impl Backend {
    /// Release one lease on a credential.
    ///
    /// Single-use keys are deleted outright. Shared keys are reference
    /// counted on the role and deleted when the last lease goes away; the
    /// role is cleared and persisted before the remote delete, so a failed
    /// delete surfaces as [`BackendError::Revocation`] with local state
    /// already released.
    pub async fn revoke(&self, internal: &InternalData) -> Result<(), BackendError> {
        let client = self
            .client
            .get_or_construct(self.storage.as_ref())
            .await
            .map_err(BackendError::into_client_unavailable)?;

        if internal.key_id.is_empty() {
            return Err(BackendError::Validation(
                "missing key_id in secret internal data".to_string(),
            ));
        }

        if !internal.multi_use {
            delete_remote(client.as_ref(), &internal.key_id).await?;
            info!(role = %internal.role, key_id = %internal.key_id, "Revoked single-use API key");
            return Ok(());
        }

        let name = internal.role.as_str();
        {
            let _guard = self.locks.lock(name).await;
            let role = if name.is_empty() {
                None
            } else {
                self.get_role(name).await?
            };

            match role {
                Some(mut role) if role.cached_key_id == internal.key_id && role.usage_count > 0 => {
                    role.usage_count -= 1;
                    if role.usage_count > 0 {
                        self.set_role(name, &role).await?;
                        debug!(role = %name, key_id = %internal.key_id, usage_count = role.usage_count, "Released shared API key lease");
                        return Ok(());
                    }

                    role.clear_cached_key();
                    self.set_role(name, &role).await?;
                    delete_remote(client.as_ref(), &internal.key_id).await?;
                    info!(role = %name, key_id = %internal.key_id, "Revoked shared API key");
                    return Ok(());
                }
                Some(_) => {
                    debug!(role = %name, key_id = %internal.key_id, "Key is not cached on role; deleting directly");
                }
                None => {
                    warn!(role = %name, key_id = %internal.key_id, "Role not found; deleting API key without updating role");
                }
            }
        }

        delete_remote(client.as_ref(), &internal.key_id).await?;
        info!(role = %name, key_id = %internal.key_id, "Revoked API key");
        Ok(())
    }

    /// Renew a lease using the role's current TTLs.
    pub async fn renew(&self, internal: &InternalData) -> Result<RenewResponse, BackendError> {
        let role = self.require_role(&internal.role).await.map_err(|e| match e {
            BackendError::Validation(_) => BackendError::role_not_found(),
            other => other,
        })?;
        Ok(RenewResponse {
            internal: internal.clone(),
            lease: LeaseOptions::from_role(&role),
        })
    }
}

async fn delete_remote(client: &dyn CredentialIssuer, key_id: &str) -> Result<(), BackendError> {
    client
        .delete_key(key_id)
        .await
        .map_err(|e| BackendError::Revocation(e.to_string()))
}
