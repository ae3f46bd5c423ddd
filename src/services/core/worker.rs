//! Async front of the lifecycle manager.
//!
//! Each call takes the matching lock from [`ModLocks`], then runs the blocking operation
//! on tokio's blocking pool. The guard moves into the blocking closure, so the lock is held
//! until the filesystem work is finished. Dropping the returned future only abandons the
//! result; work already handed to the pool runs to completion.

use super::mod_locks::ModLocks;
use crate::services::mods::{BulkResult, ImportResult, ModLifecycleManager, RescanResult};
use crate::types::{Category, ModRecord, VaultResult};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct ModWorker {
    manager: Arc<ModLifecycleManager>,
    locks: Arc<ModLocks>,
}

impl ModWorker {
    pub fn new(manager: Arc<ModLifecycleManager>) -> Self {
        Self::with_locks(manager, Arc::new(ModLocks::new()))
    }

    pub fn with_locks(manager: Arc<ModLifecycleManager>, locks: Arc<ModLocks>) -> Self {
        Self { manager, locks }
    }

    pub fn manager(&self) -> &Arc<ModLifecycleManager> {
        &self.manager
    }

    async fn run_for_mod<T, F>(&self, id: &str, op: F) -> VaultResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ModLifecycleManager) -> VaultResult<T> + Send + 'static,
    {
        let guard = self.locks.acquire_mod(id).await?;
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            op(&manager)
        })
        .await?
    }

    async fn run_batch<T, F>(&self, op: F) -> VaultResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ModLifecycleManager) -> VaultResult<T> + Send + 'static,
    {
        let guard = self.locks.acquire_batch().await?;
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            op(&manager)
        })
        .await?
    }

    pub async fn import(&self, archive: PathBuf, category: String) -> VaultResult<ImportResult> {
        self.run_batch(move |m| m.import(&archive, &category)).await
    }

    pub async fn rescan(&self) -> VaultResult<RescanResult> {
        self.run_batch(|m| m.rescan()).await
    }

    pub async fn enable(&self, id: String) -> VaultResult<ModRecord> {
        let key = id.clone();
        self.run_for_mod(&key, move |m| m.enable(&id)).await
    }

    pub async fn disable(&self, id: String) -> VaultResult<ModRecord> {
        let key = id.clone();
        self.run_for_mod(&key, move |m| m.disable(&id)).await
    }

    pub async fn delete(&self, id: String) -> VaultResult<()> {
        let key = id.clone();
        self.run_for_mod(&key, move |m| m.delete(&id)).await
    }

    pub async fn rename(&self, id: String, display_name: String) -> VaultResult<ModRecord> {
        let key = id.clone();
        self.run_for_mod(&key, move |m| m.rename(&id, &display_name))
            .await
    }

    pub async fn set_preview(&self, id: String, image: PathBuf) -> VaultResult<ModRecord> {
        let key = id.clone();
        self.run_for_mod(&key, move |m| m.set_preview(&id, &image))
            .await
    }

    pub async fn set_category(&self, id: String, category: String) -> VaultResult<ModRecord> {
        let key = id.clone();
        self.run_for_mod(&key, move |m| m.set_category(&id, &category))
            .await
    }

    pub async fn bulk_enable(&self, ids: Vec<String>) -> VaultResult<BulkResult> {
        self.run_batch(move |m| Ok(m.bulk_enable(&ids))).await
    }

    pub async fn bulk_disable(&self, ids: Vec<String>) -> VaultResult<BulkResult> {
        self.run_batch(move |m| Ok(m.bulk_disable(&ids))).await
    }

    // Category edits re-point member records, so they exclude every other writer.

    pub async fn add_category(&self, name: String) -> VaultResult<Category> {
        self.run_batch(move |m| m.categories().add(&name)).await
    }

    pub async fn rename_category(&self, old_name: String, new_name: String) -> VaultResult<Category> {
        self.run_batch(move |m| m.categories().rename(&old_name, &new_name))
            .await
    }

    pub async fn delete_category(&self, name: String) -> VaultResult<()> {
        self.run_batch(move |m| m.categories().delete(&name)).await
    }

    pub fn list(&self) -> Vec<ModRecord> {
        self.manager.list()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.manager.categories().get()
    }
}

#[cfg(test)]
#[path = "tests/worker_tests.rs"]
mod tests;
