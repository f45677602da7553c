//! API endpoints for roles.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};

use crate::backend::{RoleFields, WriteOperation};

use super::routes::AppState;
use super::types::*;

/// Create the role API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_roles)).route(
        "/:name",
        get(read_role)
            .post(write_role)
            .patch(update_role)
            .delete(delete_role),
    )
}

/// GET /v1/role
async fn list_roles(State(state): State<Arc<AppState>>) -> ApiResult<Json<DataResponse<KeysResponse>>> {
    let keys = state.backend.list_roles().await?;
    Ok(DataResponse::new(KeysResponse { keys }))
}

/// GET /v1/role/:name
async fn read_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<DataResponse<serde_json::Value>>> {
    match state.backend.read_role(&name).await? {
        Some(role) => Ok(DataResponse::new(role.to_response_data())),
        None => Err(ApiError::not_found(format!("role {} not found", name))),
    }
}

/// POST /v1/role/:name
/// Creates the role, or updates it when it already exists.
async fn write_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(fields): Json<RoleFields>,
) -> ApiResult<StatusCode> {
    let op = if state.backend.role_exists(&name).await? {
        WriteOperation::Update
    } else {
        WriteOperation::Create
    };
    state.backend.write_role(&name, fields, op).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /v1/role/:name
async fn update_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(fields): Json<RoleFields>,
) -> ApiResult<StatusCode> {
    if !state.backend.role_exists(&name).await? {
        return Err(ApiError::not_found(format!("role {} not found", name)));
    }
    state
        .backend
        .write_role(&name, fields, WriteOperation::Update)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/role/:name
async fn delete_role(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.backend.delete_role(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::{configured_backend, role_fields};
    use crate::config::Config;
    use std::path::PathBuf;

    async fn state() -> Arc<AppState> {
        let (backend, _, _) = configured_backend().await;
        AppState::new(Config::new(PathBuf::from("/tmp")), Arc::new(backend))
    }

    #[tokio::test]
    async fn test_role_crud_over_http_handlers() {
        let state = state().await;
        write_role(
            State(state.clone()),
            Path("orders".to_string()),
            Json(role_fields(true)),
        )
        .await
        .unwrap();

        let Json(body) = read_role(State(state.clone()), Path("orders".to_string()))
            .await
            .unwrap();
        assert_eq!(body.data["owner"], "roleOwner");
        assert_eq!(body.data["multi_use_key"], true);

        let Json(list) = list_roles(State(state.clone())).await.unwrap();
        assert_eq!(list.data.keys, vec!["orders".to_string()]);

        delete_role(State(state.clone()), Path("orders".to_string()))
            .await
            .unwrap();
        let err = read_role(State(state.clone()), Path("orders".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_validation_maps_to_bad_request() {
        let state = state().await;
        let err = write_role(
            State(state),
            Path("orders".to_string()),
            Json(RoleFields::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "missing owner in role");
    }

    #[tokio::test]
    async fn test_patch_requires_existing_role() {
        let state = state().await;
        let err = update_role(
            State(state),
            Path("ghost".to_string()),
            Json(RoleFields::default()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
