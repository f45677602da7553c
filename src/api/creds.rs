//! API endpoint issuing credentials for a role.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;

use crate::backend::{CredentialData, RequestContext};

use super::routes::AppState;
use super::types::*;

/// Header carrying the display name of the calling entity.
pub const DISPLAY_NAME_HEADER: &str = "x-display-name";

const ANONYMOUS: &str = "anonymous";

/// Create the creds API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/:name", get(issue_credential).post(issue_credential))
}

fn request_context(state: &AppState, name: &str, headers: &HeaderMap) -> RequestContext {
    let display_name = headers
        .get(DISPLAY_NAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(ANONYMOUS);
    RequestContext {
        mount_point: state.config.mount_path.clone(),
        path: format!("creds/{}", name),
        display_name: display_name.to_string(),
    }
}

/// GET|POST /v1/creds/:name
async fn issue_credential(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Json<LeaseResponse<CredentialData>>> {
    let ctx = request_context(&state, &name, &headers);
    let secret = state.backend.request_credential(&ctx, &name).await?;
    let record = state.leases.register(&secret).await;

    Ok(Json(LeaseResponse {
        lease_duration: record.remaining_secs(Utc::now()),
        lease_id: record.lease_id,
        renewable: true,
        data: secret.data,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::backend_with_role;
    use crate::config::Config;
    use axum::http::{HeaderValue, StatusCode};
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_issue_registers_lease() {
        let (backend, issuer, _) = backend_with_role("testccloud", false).await;
        let state = AppState::new(Config::new(PathBuf::from("/tmp")), Arc::new(backend));

        let mut headers = HeaderMap::new();
        headers.insert(DISPLAY_NAME_HEADER, HeaderValue::from_static("alice"));
        let Json(resp) = issue_credential(
            State(state.clone()),
            Path("testccloud".to_string()),
            headers,
        )
        .await
        .unwrap();

        assert_eq!(resp.data.key_id, "KEY1");
        assert_eq!(resp.data.secret, "SECRET1");
        assert!(resp.lease_id.starts_with("ccloud/creds/testccloud/"));
        assert!(resp.lease_duration > 3500);
        assert_eq!(state.leases.list().await, vec![resp.lease_id]);
        assert!(issuer
            .last_request()
            .unwrap()
            .description
            .ends_with("entity=alice"));
    }

    #[tokio::test]
    async fn test_missing_role_is_not_found() {
        let (backend, _, _) = backend_with_role("testccloud", false).await;
        let state = AppState::new(Config::new(PathBuf::from("/tmp")), Arc::new(backend));
        let err = issue_credential(State(state.clone()), Path("ghost".to_string()), HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(state.leases.len().await, 0);
    }

    #[test]
    fn test_context_defaults_to_anonymous() {
        let (backend, _, _) = crate::backend::testing::empty_backend();
        let state = AppState::new(Config::new(PathBuf::from("/tmp")), Arc::new(backend));
        let ctx = request_context(&state, "orders", &HeaderMap::new());
        assert_eq!(ctx.display_name, "anonymous");
        assert_eq!(ctx.mount_point, "ccloud/");
        assert_eq!(ctx.path, "creds/orders");
    }
}
