//! Per-role in-process locks.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Map of role name to mutex, created on demand.
#[derive(Default)]
pub struct RoleLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RoleLocks {
    /// Wait for exclusive access to `name`'s stored state.
    pub async fn lock(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(name.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry for `name` unless someone is holding or waiting on it.
    pub async fn forget(&self, name: &str) {
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(name) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(name);
            }
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
