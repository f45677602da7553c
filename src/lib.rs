//! # ccloud-secrets
//!
//! Dynamic Confluent Cloud API keys behind operator-defined roles.
//!
//! This library provides:
//! - A secrets backend that mints, shares and revokes API keys per role
//! - A reqwest client for the Confluent Cloud IAM API-keys endpoint
//! - Pluggable key-value storage (memory, JSON file, SQLite) with optional sealing
//! - An HTTP adapter with lease tracking and expiry-driven revocation
//!
//! ## Architecture
//!
//! ```text
//!   HTTP (/v1/...) ──► api ──► backend ──► storage (config, role/*)
//!                       │         │
//!                       │         └──► issuer ──► Confluent Cloud
//!                       ▼
//!                  lease tracker ──(expiry)──► backend::revoke
//! ```
//!
//! ## Modules
//! - `backend`: configuration, roles, credential lifecycle, revocation
//! - `issuer`: credential issuer trait and the Confluent Cloud client
//! - `storage`: storage trait and implementations
//! - `api`: HTTP routes and lease tracking
//! - `config`: process configuration from the environment

pub mod api;
pub mod backend;
pub mod config;
pub mod issuer;
pub mod storage;
pub mod util;

pub use backend::Backend;
pub use config::Config;
