//! Per-MOD mutual exclusion for filesystem-mutating operations.
//!
//! Single-MOD operations (enable/disable/delete/rename...) hold the batch lock shared and
//! their own id lock exclusively, so different ids proceed in parallel while the same id
//! is serialized. Batch operations (import, rescan, bulk toggles, category edits) hold the
//! batch lock exclusively. Acquisition gives up after a timeout with `Busy`.

use crate::types::{VaultError, VaultResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

pub const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ModLocks {
    batch: Arc<RwLock<()>>,
    per_mod: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    timeout: Duration,
}

/// Held while a single-MOD operation runs.
pub struct ModGuard {
    _item: OwnedMutexGuard<()>,
    _batch: OwnedRwLockReadGuard<()>,
}

/// Held while a batch operation runs.
pub struct BatchGuard {
    _batch: OwnedRwLockWriteGuard<()>,
}

impl ModLocks {
    pub fn new() -> Self {
        Self::with_timeout(LOCK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            batch: Arc::new(RwLock::new(())),
            per_mod: StdMutex::new(HashMap::new()),
            timeout,
        }
    }

    pub async fn acquire_mod(&self, mod_id: &str) -> VaultResult<ModGuard> {
        let item = self.mod_mutex(mod_id);
        let batch = Arc::clone(&self.batch);
        let acquire = async move {
            let batch_guard = batch.read_owned().await;
            let item_guard = item.lock_owned().await;
            ModGuard {
                _item: item_guard,
                _batch: batch_guard,
            }
        };
        tokio::time::timeout(self.timeout, acquire)
            .await
            .map_err(|_| VaultError::Busy(format!("Mod '{mod_id}' is being modified. Please wait.")))
    }

    pub async fn acquire_batch(&self) -> VaultResult<BatchGuard> {
        match tokio::time::timeout(self.timeout, Arc::clone(&self.batch).write_owned()).await {
            Ok(guard) => Ok(BatchGuard { _batch: guard }),
            Err(_) => Err(VaultError::Busy(
                "Another operation is in progress. Please wait.".to_string(),
            )),
        }
    }

    fn mod_mutex(&self, mod_id: &str) -> Arc<Mutex<()>> {
        let mut map = self
            .per_mod
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Drop entries nobody holds so the map does not grow with every id ever touched.
        map.retain(|_, m| Arc::strong_count(m) > 1);
        Arc::clone(
            map.entry(mod_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

impl Default for ModLocks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/mod_locks_tests.rs"]
mod tests;
