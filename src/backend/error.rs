//! Backend error taxonomy.

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Malformed or missing caller input.
    #[error("{0}")]
    Validation(String),

    /// A role or the configuration is absent where it is required.
    #[error("{0}")]
    NotFound(String),

    /// The issuer client cannot be built from the stored configuration.
    #[error("error getting client: {0}")]
    Configuration(String),

    /// Same as `Configuration`, raised on the revocation path where nothing
    /// was touched as a result.
    #[error("client unavailable, credential not revoked: {0}")]
    ClientUnavailable(String),

    /// Minting failed or returned an unusable key pair. Role state is unchanged.
    #[error("error creating CCloud API key: {0}")]
    Issuance(String),

    /// Remote deletion failed after local state was already cleared.
    #[error("error revoking CCloud API key: {0}")]
    Revocation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BackendError {
    pub(crate) fn missing_role_name() -> Self {
        Self::Validation("missing role name".to_string())
    }

    pub(crate) fn role_not_found() -> Self {
        Self::NotFound("role is nil".to_string())
    }

    /// Reclassify a client construction failure for the revocation path.
    pub(crate) fn into_client_unavailable(self) -> Self {
        match self {
            Self::Configuration(msg) => Self::ClientUnavailable(msg),
            other => other,
        }
    }
}
