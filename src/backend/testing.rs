//! Test doubles for the backend.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Backend, ConfigFields, RequestContext, RoleFields, WriteOperation};
use crate::issuer::{
    validate_config, CreateKeyRequest, CredentialIssuer, IssuedKey, IssuerConfig, IssuerError,
    IssuerFactory,
};
use crate::storage::{InMemoryStorage, SharedStorage};

/// Issuer that hands out `KEY<n>`/`SECRET<n>` pairs and records deletions.
#[derive(Default)]
pub struct FakeIssuer {
    creates: AtomicUsize,
    deleted: Mutex<Vec<String>>,
    last_request: Mutex<Option<CreateKeyRequest>>,
    pub fail_create: AtomicBool,
    pub fail_delete: AtomicBool,
    pub return_empty: AtomicBool,
}

impl FakeIssuer {
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<CreateKeyRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialIssuer for FakeIssuer {
    async fn create_key(&self, request: &CreateKeyRequest) -> Result<IssuedKey, IssuerError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(IssuerError::Api {
                status: 500,
                body: "boom".to_string(),
            });
        }
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        if self.return_empty.load(Ordering::SeqCst) {
            return Ok(IssuedKey {
                id: String::new(),
                secret: String::new(),
            });
        }
        Ok(IssuedKey {
            id: format!("KEY{}", n),
            secret: format!("SECRET{}", n),
        })
    }

    async fn delete_key(&self, key_id: &str) -> Result<(), IssuerError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(IssuerError::Request("connection refused".to_string()));
        }
        self.deleted.lock().unwrap().push(key_id.to_string());
        Ok(())
    }
}

/// Factory returning the shared [`FakeIssuer`] once the config validates.
pub struct FakeFactory {
    issuer: Arc<FakeIssuer>,
    builds: AtomicUsize,
}

impl FakeFactory {
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl IssuerFactory for FakeFactory {
    fn build(&self, config: Option<&IssuerConfig>) -> Result<Arc<dyn CredentialIssuer>, IssuerError> {
        validate_config(config)?;
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.issuer.clone())
    }
}

pub fn test_config_fields() -> ConfigFields {
    ConfigFields {
        api_key_id: Some("cloud-key".to_string()),
        api_key_secret: Some("cloud-secret".to_string()),
        url: Some("https://ccloud.example".to_string()),
    }
}

pub fn role_fields(multi_use: bool) -> RoleFields {
    RoleFields {
        owner: Some("roleOwner".to_string()),
        owner_env: Some("roleOwnerEnv".to_string()),
        resource: Some("testResource".to_string()),
        resource_env: Some("resource_envTest".to_string()),
        multi_use_key: Some(multi_use),
        ..Default::default()
    }
}

pub fn request_context(role: &str) -> RequestContext {
    RequestContext {
        mount_point: "ccloud/".to_string(),
        path: format!("creds/{}", role),
        display_name: "token-test".to_string(),
    }
}

/// Backend over empty in-memory storage with no configuration.
pub fn empty_backend() -> (Backend, Arc<FakeIssuer>, Arc<FakeFactory>) {
    backend_over(Arc::new(InMemoryStorage::new()))
}

/// Backend over the given storage, wired to a fresh [`FakeIssuer`].
pub fn backend_over(storage: SharedStorage) -> (Backend, Arc<FakeIssuer>, Arc<FakeFactory>) {
    let issuer = Arc::new(FakeIssuer::default());
    let factory = Arc::new(FakeFactory {
        issuer: issuer.clone(),
        builds: AtomicUsize::new(0),
    });
    let backend = Backend::new(storage, factory.clone());
    (backend, issuer, factory)
}

/// Backend with a valid issuer configuration already stored.
pub async fn configured_backend() -> (Backend, Arc<FakeIssuer>, Arc<FakeFactory>) {
    let (backend, issuer, factory) = empty_backend();
    backend
        .write_config(test_config_fields(), WriteOperation::Create)
        .await
        .expect("store test config");
    (backend, issuer, factory)
}

/// Configured backend plus one stored role.
pub async fn backend_with_role(
    name: &str,
    multi_use: bool,
) -> (Backend, Arc<FakeIssuer>, Arc<FakeFactory>) {
    let (backend, issuer, factory) = configured_backend().await;
    backend
        .write_role(name, role_fields(multi_use), WriteOperation::Create)
        .await
        .expect("store test role");
    (backend, issuer, factory)
}
