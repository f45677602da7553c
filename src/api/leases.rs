//! Lease tracking for issued credentials.
//!
//! Every credential handed out through `creds/<role>` gets a lease recorded
//! here. Leases live in memory only: the backend persists roles, not leases.
//! A background sweep revokes leases once they expire; revocations that fail
//! stay tracked and are retried on the next sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::{InternalData, LeaseOptions, RenewResponse, SecretResponse};
use crate::config::LeaseConfig;

use super::routes::AppState;
use super::types::*;

#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("lease not found: {0}")]
    NotFound(String),

    #[error("lease {0} has reached its max TTL")]
    MaxTtlReached(String),
}

/// System lease bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    pub default_ttl: Duration,
    pub max_ttl: Duration,
}

impl From<&LeaseConfig> for LeasePolicy {
    fn from(config: &LeaseConfig) -> Self {
        Self {
            default_ttl: config.default_ttl,
            max_ttl: config.max_ttl,
        }
    }
}

impl LeasePolicy {
    /// Resolve `(ttl, max_ttl)` for a lease: role values win over the
    /// defaults, and neither may exceed the system maximum.
    pub fn effective(&self, lease: &LeaseOptions) -> (Duration, Duration) {
        let max_ttl = lease
            .max_ttl
            .map(|m| m.min(self.max_ttl))
            .unwrap_or(self.max_ttl);
        let ttl = lease.ttl.unwrap_or(self.default_ttl).min(max_ttl);
        (ttl, max_ttl)
    }
}

/// One outstanding lease.
#[derive(Debug, Clone, Serialize)]
pub struct LeaseRecord {
    pub lease_id: String,
    pub internal: InternalData,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(with = "crate::util::duration_secs")]
    pub max_ttl: Duration,
}

impl LeaseRecord {
    /// Latest instant this lease may ever be extended to.
    pub fn hard_limit(&self) -> DateTime<Utc> {
        add_clamped(self.issued_at, self.max_ttl)
    }

    /// Whole seconds left until expiry at `now`.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

/// `at + duration`, saturating at the latest representable instant.
fn add_clamped(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// In-memory lease table.
pub struct LeaseTracker {
    mount: String,
    policy: LeasePolicy,
    leases: RwLock<HashMap<String, LeaseRecord>>,
}

impl LeaseTracker {
    pub fn new(mount: impl Into<String>, policy: LeasePolicy) -> Self {
        Self {
            mount: mount.into(),
            policy,
            leases: RwLock::new(HashMap::new()),
        }
    }

    /// Record a lease for a freshly issued credential.
    pub async fn register(&self, secret: &SecretResponse) -> LeaseRecord {
        self.register_at(secret, Utc::now()).await
    }

    async fn register_at(&self, secret: &SecretResponse, now: DateTime<Utc>) -> LeaseRecord {
        let (ttl, max_ttl) = self.policy.effective(&secret.lease);
        let record = LeaseRecord {
            lease_id: format!(
                "{}creds/{}/{}",
                self.mount,
                secret.internal.role,
                Uuid::new_v4()
            ),
            internal: secret.internal.clone(),
            issued_at: now,
            expires_at: add_clamped(now, ttl),
            max_ttl,
        };
        self.leases
            .write()
            .await
            .insert(record.lease_id.clone(), record.clone());
        tracing::debug!(lease_id = %record.lease_id, ttl_secs = ttl.as_secs(), "Registered lease");
        record
    }

    pub async fn get(&self, lease_id: &str) -> Result<LeaseRecord, LeaseError> {
        self.leases
            .read()
            .await
            .get(lease_id)
            .cloned()
            .ok_or_else(|| LeaseError::NotFound(lease_id.to_string()))
    }

    /// Outstanding lease ids, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.leases.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.leases.read().await.len()
    }

    pub async fn remove(&self, lease_id: &str) -> Option<LeaseRecord> {
        self.leases.write().await.remove(lease_id)
    }

    /// Take a lease out of the table for revocation. Only one caller can
    /// claim a given lease; the rest see `NotFound`.
    pub async fn claim(&self, lease_id: &str) -> Result<LeaseRecord, LeaseError> {
        self.remove(lease_id)
            .await
            .ok_or_else(|| LeaseError::NotFound(lease_id.to_string()))
    }

    /// Put back a lease whose revocation failed so a later sweep retries it.
    pub async fn restore(&self, record: LeaseRecord) {
        self.leases
            .write()
            .await
            .insert(record.lease_id.clone(), record);
    }

    /// Leases whose expiry is at or before `now`.
    pub async fn expired(&self, now: DateTime<Utc>) -> Vec<LeaseRecord> {
        self.leases
            .read()
            .await
            .values()
            .filter(|record| record.expires_at <= now)
            .cloned()
            .collect()
    }

    /// Extend a lease from now by `increment`, or by the TTL the backend
    /// returned on renewal. The lease never outlives `issued_at + max_ttl`.
    pub async fn renew(
        &self,
        lease_id: &str,
        increment: Option<Duration>,
        renewed: &RenewResponse,
    ) -> Result<LeaseRecord, LeaseError> {
        self.renew_at(lease_id, increment, renewed, Utc::now()).await
    }

    async fn renew_at(
        &self,
        lease_id: &str,
        increment: Option<Duration>,
        renewed: &RenewResponse,
        now: DateTime<Utc>,
    ) -> Result<LeaseRecord, LeaseError> {
        let mut leases = self.leases.write().await;
        let record = leases
            .get_mut(lease_id)
            .ok_or_else(|| LeaseError::NotFound(lease_id.to_string()))?;

        let (role_ttl, role_max_ttl) = self.policy.effective(&renewed.lease);
        record.max_ttl = record.max_ttl.min(role_max_ttl);
        let limit = record.hard_limit();
        if now >= limit {
            return Err(LeaseError::MaxTtlReached(lease_id.to_string()));
        }

        let ttl = increment.unwrap_or(role_ttl);
        record.expires_at = add_clamped(now, ttl).min(limit);
        Ok(record.clone())
    }
}

/// Create the lease API routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_leases))
        .route("/revoke", post(revoke_lease))
        .route("/renew", post(renew_lease))
}

/// GET /v1/leases
async fn list_leases(State(state): State<Arc<AppState>>) -> Json<DataResponse<KeysResponse>> {
    DataResponse::new(KeysResponse {
        keys: state.leases.list().await,
    })
}

/// POST /v1/leases/revoke
async fn revoke_lease(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RevokeLeaseRequest>,
) -> ApiResult<StatusCode> {
    let record = state.leases.claim(&req.lease_id).await?;
    if let Err(e) = state.backend.revoke(&record.internal).await {
        state.leases.restore(record).await;
        return Err(e.into());
    }
    tracing::info!(lease_id = %record.lease_id, "Revoked lease");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/leases/renew
async fn renew_lease(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RenewLeaseRequest>,
) -> ApiResult<Json<LeaseResponse<InternalData>>> {
    let record = state.leases.get(&req.lease_id).await?;
    let renewed = state.backend.renew(&record.internal).await?;
    let record = state
        .leases
        .renew(&record.lease_id, req.increment, &renewed)
        .await?;
    Ok(Json(LeaseResponse {
        lease_duration: record.remaining_secs(Utc::now()),
        lease_id: record.lease_id,
        renewable: true,
        data: record.internal,
    }))
}

/// Revoke every lease that expired by `now`. Returns how many were revoked.
pub async fn sweep_expired(state: &AppState, now: DateTime<Utc>) -> usize {
    let mut revoked = 0;
    for expired in state.leases.expired(now).await {
        // Skip leases an explicit revoke claimed since the scan.
        let Ok(record) = state.leases.claim(&expired.lease_id).await else {
            continue;
        };
        match state.backend.revoke(&record.internal).await {
            Ok(()) => {
                revoked += 1;
                tracing::info!(lease_id = %record.lease_id, "Revoked expired lease");
            }
            Err(e) => {
                tracing::warn!(lease_id = %record.lease_id, error = %e, "Failed to revoke expired lease; will retry");
                state.leases.restore(record).await;
            }
        }
    }
    revoked
}

/// Run [`sweep_expired`] every `interval` until the task is aborted.
pub fn spawn_expiry_sweeper(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let revoked = sweep_expired(&state, Utc::now()).await;
            if revoked > 0 {
                tracing::debug!(revoked, "Lease sweep finished");
            }
        }
    })
}
