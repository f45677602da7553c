//! HTTP adapter for the secrets backend.
//!
//! ## Endpoints
//!
//! - `GET|POST|PATCH|DELETE /v1/config` - Issuer endpoint and credentials
//! - `GET /v1/role` - List role names
//! - `GET|POST|PATCH|DELETE /v1/role/{name}` - Role policy
//! - `GET|POST /v1/creds/{name}` - Issue a credential for a role
//! - `GET /v1/leases` - List outstanding leases
//! - `POST /v1/leases/revoke` - Revoke a lease now
//! - `POST /v1/leases/renew` - Renew a lease
//! - `GET /v1/health` - Health check
//!
//! Errors are returned as `{"errors": ["..."]}`.

mod config;
mod creds;
pub mod leases;
mod roles;
mod routes;
pub mod types;

pub use creds::DISPLAY_NAME_HEADER;
pub use routes::{router, serve, AppState};
pub use types::*;
