//! Seal wrapping for stored entries.
//!
//! Uses AES-256-GCM with a static key. Sealed values are wrapped in
//! `<sealed v="1">BASE64(nonce||ciphertext)</sealed>` so they can be told
//! apart from entries written before sealing was enabled; unwrapped values
//! are read back as plaintext.

use super::{SharedStorage, Storage, StorageEntry, StorageError};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

/// Key length in bytes (256 bits for AES-256)
pub const SEAL_KEY_LENGTH: usize = 32;

/// Nonce length in bytes (96 bits for AES-GCM)
const NONCE_LENGTH: usize = 12;

const SEAL_VERSION: &str = "1";
const SEALED_PREFIX: &str = "<sealed v=\"";
const SEALED_SUFFIX: &str = "</sealed>";

/// Storage wrapper that encrypts entries whose key matches one of `prefixes`.
pub struct SealedStorage {
    inner: SharedStorage,
    key: [u8; SEAL_KEY_LENGTH],
    prefixes: Vec<String>,
}

impl SealedStorage {
    pub fn new(inner: SharedStorage, key: [u8; SEAL_KEY_LENGTH], prefixes: Vec<String>) -> Self {
        Self {
            inner,
            key,
            prefixes,
        }
    }

    /// The issuer configuration and every role are sealed.
    pub fn default_prefixes() -> Vec<String> {
        vec!["config".to_string(), "role/".to_string()]
    }

    fn should_seal(&self, key: &str) -> bool {
        self.prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    fn seal(&self, entry: &StorageEntry) -> Result<Vec<u8>, StorageError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|e| StorageError::Seal {
            key: entry.key.clone(),
            reason: format!("failed to create cipher: {}", e),
        })?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), entry.value.as_slice())
            .map_err(|e| StorageError::Seal {
                key: entry.key.clone(),
                reason: format!("encryption failed: {}", e),
            })?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!(
            "{}{}\">{}{}",
            SEALED_PREFIX,
            SEAL_VERSION,
            BASE64.encode(&combined),
            SEALED_SUFFIX
        )
        .into_bytes())
    }

    fn unseal(&self, key: &str, value: Vec<u8>) -> Result<Vec<u8>, StorageError> {
        let seal_err = |reason: String| StorageError::Seal {
            key: key.to_string(),
            reason,
        };

        let parsed = std::str::from_utf8(&value)
            .ok()
            .and_then(parse_sealed)
            .map(|(version, payload)| (version.to_string(), payload.to_string()));
        let Some((version, payload)) = parsed else {
            // Written before sealing was enabled
            return Ok(value);
        };
        if version != SEAL_VERSION {
            return Err(seal_err(format!("unsupported seal version {}", version)));
        }

        let combined = BASE64
            .decode(payload)
            .map_err(|e| seal_err(format!("invalid base64: {}", e)))?;
        if combined.len() < NONCE_LENGTH {
            return Err(seal_err("sealed value too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| seal_err(format!("failed to create cipher: {}", e)))?;
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| seal_err("invalid key or corrupted data".to_string()))
    }
}

/// Split a sealed value into (version, base64 payload).
fn parse_sealed(value: &str) -> Option<(&str, &str)> {
    let trimmed = value.trim();
    let inner = trimmed
        .strip_prefix(SEALED_PREFIX)?
        .strip_suffix(SEALED_SUFFIX)?;
    let version_end = inner.find("\">")?;
    Some((&inner[..version_end], &inner[version_end + 2..]))
}

/// Parse a seal key from hex (64 chars) or base64.
pub fn parse_seal_key(key_str: &str) -> Result<[u8; SEAL_KEY_LENGTH], String> {
    let trimmed = key_str.trim();

    let bytes = if trimmed.len() == SEAL_KEY_LENGTH * 2
        && trimmed.chars().all(|c| c.is_ascii_hexdigit())
    {
        hex::decode(trimmed).map_err(|e| format!("invalid hex key: {}", e))?
    } else {
        BASE64
            .decode(trimmed)
            .map_err(|_| "key is neither valid hex nor base64".to_string())?
    };

    if bytes.len() != SEAL_KEY_LENGTH {
        return Err(format!(
            "key must be {} bytes, got {} bytes",
            SEAL_KEY_LENGTH,
            bytes.len()
        ));
    }

    let mut key = [0u8; SEAL_KEY_LENGTH];
    key.copy_from_slice(&bytes);
    Ok(key)
}

#[async_trait]
impl Storage for SealedStorage {
    fn is_persistent(&self) -> bool {
        self.inner.is_persistent()
    }

    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StorageError> {
        let Some(entry) = self.inner.get(key).await? else {
            return Ok(None);
        };
        if !self.should_seal(key) {
            return Ok(Some(entry));
        }
        let value = self.unseal(key, entry.value)?;
        Ok(Some(StorageEntry::new(key, value)))
    }

    async fn put(&self, entry: StorageEntry) -> Result<(), StorageError> {
        if !self.should_seal(&entry.key) {
            return self.inner.put(entry).await;
        }
        let sealed = self.seal(&entry)?;
        self.inner.put(StorageEntry::new(entry.key, sealed)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(prefix).await
    }
}
