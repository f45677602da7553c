//! API endpoints for the issuer configuration.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;

use crate::backend::{ConfigFields, WriteOperation};
use crate::issuer::IssuerConfig;

use super::routes::AppState;
use super::types::*;

/// Create the config API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route(
        "/",
        get(read_config)
            .post(write_config)
            .patch(update_config)
            .delete(delete_config),
    )
}

/// Configuration as returned to callers. The secret itself is never echoed.
#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub ccloud_api_key_id: String,
    pub api_key_secret_set: bool,
    pub url: String,
}

impl From<&IssuerConfig> for ConfigView {
    fn from(config: &IssuerConfig) -> Self {
        Self {
            ccloud_api_key_id: config.api_key_id.clone(),
            api_key_secret_set: !config.api_key_secret.is_empty(),
            url: config.url.clone(),
        }
    }
}

/// GET /v1/config
async fn read_config(State(state): State<Arc<AppState>>) -> ApiResult<Json<DataResponse<ConfigView>>> {
    match state.backend.read_config().await? {
        Some(config) => Ok(DataResponse::new(ConfigView::from(&config))),
        None => Err(ApiError::not_found("config not found")),
    }
}

/// POST /v1/config
/// Creates the configuration, or updates it when one is already stored.
async fn write_config(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<ConfigFields>,
) -> ApiResult<StatusCode> {
    let op = match state.backend.read_config().await? {
        Some(_) => WriteOperation::Update,
        None => WriteOperation::Create,
    };
    state.backend.write_config(fields, op).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /v1/config
async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<ConfigFields>,
) -> ApiResult<StatusCode> {
    state
        .backend
        .write_config(fields, WriteOperation::Update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/config
async fn delete_config(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.backend.delete_config().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{empty_backend, test_config_fields};
    use crate::config::Config;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_config_read_hides_secret() {
        let (backend, _, _) = empty_backend();
        let state = AppState::new(Config::new(PathBuf::from("/tmp")), Arc::new(backend));

        let err = read_config(State(state.clone())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let status = write_config(State(state.clone()), Json(test_config_fields()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(body) = read_config(State(state.clone())).await.unwrap();
        assert_eq!(body.data.ccloud_api_key_id, "cloud-key");
        assert!(body.data.api_key_secret_set);
        let rendered = serde_json::to_string(&body).unwrap();
        assert!(!rendered.contains("cloud-secret"));
    }

    #[tokio::test]
    async fn test_post_updates_existing_config() {
        let (backend, _, _) = empty_backend();
        let state = AppState::new(Config::new(PathBuf::from("/tmp")), Arc::new(backend));
        write_config(State(state.clone()), Json(test_config_fields()))
            .await
            .unwrap();

        // Second POST carries only the url; it must merge rather than fail create validation.
        write_config(
            State(state.clone()),
            Json(ConfigFields {
                url: Some("https://other".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        let config = state.backend.read_config().await.unwrap().unwrap();
        assert_eq!(config.url, "https://other");
        assert_eq!(config.api_key_id, "cloud-key");
    }

    #[tokio::test]
    async fn test_patch_without_config_is_not_found() {
        let (backend, _, _) = empty_backend();
        let state = AppState::new(Config::new(PathBuf::from("/tmp")), Arc::new(backend));
        let err = update_config(State(state), Json(ConfigFields::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
