//! Process configuration.
//!
//! Configuration is read from environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8200`.
//! - `MOUNT_PATH` - Optional. Mount point recorded in lease ids and key descriptions. Defaults to `ccloud/`.
//! - `STORAGE_BACKEND` - Optional. `memory`, `file` or `sqlite`. Defaults to `sqlite`.
//! - `DATA_DIR` - Optional. Directory for the file/sqlite stores. Defaults to `./data`.
//! - `DEFAULT_LEASE_TTL` - Optional. Lease TTL when a role sets none. Defaults to `1h`.
//! - `MAX_LEASE_TTL` - Optional. Upper bound for any lease. Defaults to `24h`.
//! - `LEASE_SWEEP_INTERVAL` - Optional. How often expired leases are revoked. Defaults to `30s`.
//! - `SEAL_KEY` - Optional. 32-byte key (hex or base64) used to encrypt stored config and roles.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::storage::{parse_seal_key, StorageType, SEAL_KEY_LENGTH};
use crate::util::env_var_duration;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Lease bounds applied by the host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseConfig {
    /// TTL for leases whose role sets none
    pub default_ttl: Duration,

    /// Hard upper bound on any lease
    pub max_ttl: Duration,

    /// Interval of the background expiry sweep
    pub sweep_interval: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60 * 60),
            max_ttl: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Mount point of the backend, always ending in `/`
    pub mount_path: String,

    /// Storage implementation
    pub storage_backend: StorageType,

    /// Directory for persistent stores
    pub data_dir: PathBuf,

    /// Lease bounds
    pub lease: LeaseConfig,

    /// Key for sealing stored entries
    pub seal_key: Option<[u8; SEAL_KEY_LENGTH]>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mount_path", &self.mount_path)
            .field("storage_backend", &self.storage_backend)
            .field("data_dir", &self.data_dir)
            .field("lease", &self.lease)
            .field("sealed", &self.seal_key.is_some())
            .finish()
    }
}

fn normalize_mount_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "ccloud/".to_string()
    } else {
        format!("{}/", trimmed)
    }
}

fn duration_var(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    env_var_duration(name)
        .map(|value| value.unwrap_or(default))
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e))
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unparsable port, duration
    /// or seal key, or when the default lease TTL exceeds the maximum.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8200".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let mount_path =
            normalize_mount_path(&std::env::var("MOUNT_PATH").unwrap_or_default());

        let storage_backend = std::env::var("STORAGE_BACKEND")
            .map(|value| StorageType::from_str(&value))
            .unwrap_or_default();

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let defaults = LeaseConfig::default();
        let lease = LeaseConfig {
            default_ttl: duration_var("DEFAULT_LEASE_TTL", defaults.default_ttl)?,
            max_ttl: duration_var("MAX_LEASE_TTL", defaults.max_ttl)?,
            sweep_interval: duration_var("LEASE_SWEEP_INTERVAL", defaults.sweep_interval)?,
        };
        if lease.default_ttl > lease.max_ttl {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_LEASE_TTL".to_string(),
                "cannot be greater than MAX_LEASE_TTL".to_string(),
            ));
        }
        if lease.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "LEASE_SWEEP_INTERVAL".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let seal_key = match std::env::var("SEAL_KEY") {
            Ok(value) if !value.trim().is_empty() => Some(
                parse_seal_key(&value)
                    .map_err(|e| ConfigError::InvalidValue("SEAL_KEY".to_string(), e))?,
            ),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            mount_path,
            storage_backend,
            data_dir,
            lease,
            seal_key,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8200,
            mount_path: "ccloud/".to_string(),
            storage_backend: StorageType::Memory,
            data_dir,
            lease: LeaseConfig::default(),
            seal_key: None,
        }
    }
}
