//! API request and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::backend::BackendError;
use crate::util::deserialize_opt_duration;
use std::time::Duration;

use super::leases::LeaseError;

/// Error body: `{"errors": ["..."]}` with a status derived from the error kind.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        let status = match &err {
            BackendError::Validation(_) => StatusCode::BAD_REQUEST,
            BackendError::NotFound(_) => StatusCode::NOT_FOUND,
            BackendError::Configuration(_) | BackendError::ClientUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            BackendError::Issuance(_) | BackendError::Revocation(_) => StatusCode::BAD_GATEWAY,
            BackendError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl From<LeaseError> for ApiError {
    fn from(err: LeaseError) -> Self {
        let status = match &err {
            LeaseError::NotFound(_) => StatusCode::NOT_FOUND,
            LeaseError::MaxTtlReached(_) => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "errors": [self.message] })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Standard success envelope: `{"data": ...}`.
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

/// Body of a list response.
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

/// Request to revoke a lease.
#[derive(Debug, Clone, Deserialize)]
pub struct RevokeLeaseRequest {
    pub lease_id: String,
}

/// Request to renew a lease.
#[derive(Debug, Clone, Deserialize)]
pub struct RenewLeaseRequest {
    pub lease_id: String,
    /// Requested extension from now; defaults to the role's TTL.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub increment: Option<Duration>,
}

/// Lease details returned by issue and renew.
#[derive(Debug, Clone, Serialize)]
pub struct LeaseResponse<T> {
    pub lease_id: String,
    /// Seconds until the lease expires.
    pub lease_duration: u64,
    pub renewable: bool,
    pub data: T,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub outstanding_leases: usize,
}
