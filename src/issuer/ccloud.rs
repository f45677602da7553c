//! Confluent Cloud API-keys client (IAM v2).
//!
//! Provides the subset of the API needed to mint and delete API keys:
//! `POST /iam/v2/api-keys` and `DELETE /iam/v2/api-keys/{id}`, both with
//! HTTP basic auth using the configured Cloud API key.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    validate_config, CreateKeyRequest, CredentialIssuer, IssuedKey, IssuerConfig, IssuerError,
    IssuerFactory,
};

/// Public Confluent Cloud API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.confluent.cloud";

const API_KEYS_PATH: &str = "/iam/v2/api-keys";

#[derive(Debug, Serialize)]
struct ObjectReference {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<String>,
}

impl ObjectReference {
    fn new(id: &str, environment: &str) -> Self {
        Self {
            id: id.to_string(),
            environment: (!environment.is_empty()).then(|| environment.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiKeySpec {
    owner: ObjectReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<ObjectReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateApiKeyBody {
    spec: ApiKeySpec,
}

#[derive(Debug, Deserialize)]
struct ApiKeyResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    spec: Option<ApiKeyResponseSpec>,
}

#[derive(Debug, Deserialize)]
struct ApiKeyResponseSpec {
    #[serde(default)]
    secret: Option<String>,
}

fn create_body(request: &CreateKeyRequest) -> CreateApiKeyBody {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    CreateApiKeyBody {
        spec: ApiKeySpec {
            owner: ObjectReference::new(&request.owner, &request.owner_env),
            resource: (!request.resource.is_empty())
                .then(|| ObjectReference::new(&request.resource, &request.resource_env)),
            display_name: non_empty(&request.display_name),
            description: non_empty(&request.description),
        },
    }
}

fn parse_created(text: &str) -> Result<IssuedKey, IssuerError> {
    let parsed: ApiKeyResponse = serde_json::from_str(text)
        .map_err(|e| IssuerError::Decode(format!("{}: {}", e, text)))?;
    Ok(IssuedKey {
        id: parsed.id,
        secret: parsed.spec.and_then(|s| s.secret).unwrap_or_default(),
    })
}

#[derive(Clone)]
pub struct CCloudClient {
    base_url: String,
    client: reqwest::Client,
    api_key_id: String,
    api_key_secret: String,
}

impl CCloudClient {
    pub fn new(config: &IssuerConfig) -> Result<Self, IssuerError> {
        let config = validate_config(Some(config))?;
        let mut base_url = if config.url.is_empty() {
            DEFAULT_API_URL.to_string()
        } else {
            config.url.clone()
        };
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
            api_key_id: config.api_key_id.clone(),
            api_key_secret: config.api_key_secret.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CredentialIssuer for CCloudClient {
    async fn create_key(&self, request: &CreateKeyRequest) -> Result<IssuedKey, IssuerError> {
        let url = format!("{}{}", self.base_url, API_KEYS_PATH);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.api_key_id, Some(&self.api_key_secret))
            .json(&create_body(request))
            .send()
            .await
            .map_err(|e| IssuerError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(IssuerError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let key = parse_created(&text)?;
        tracing::debug!(key_id = %key.id, owner = %request.owner, "Created CCloud API key");
        Ok(key)
    }

    async fn delete_key(&self, key_id: &str) -> Result<(), IssuerError> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            API_KEYS_PATH,
            urlencoding::encode(key_id)
        );
        let resp = self
            .client
            .delete(&url)
            .basic_auth(&self.api_key_id, Some(&self.api_key_secret))
            .send()
            .await
            .map_err(|e| IssuerError::Request(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(key_id, "CCloud API key already gone");
            return Ok(());
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(IssuerError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(())
    }
}

/// Builds [`CCloudClient`] issuers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CCloudIssuerFactory;

impl IssuerFactory for CCloudIssuerFactory {
    fn build(&self, config: Option<&IssuerConfig>) -> Result<Arc<dyn CredentialIssuer>, IssuerError> {
        let config = validate_config(config)?;
        Ok(Arc::new(CCloudClient::new(config)?))
    }
}
