//! Aggregated outcomes of multi-item operations.
//!
//! Batch operations never stop at the first failing item. Each item either lands in the
//! success list or becomes a [`BulkActionError`] carrying its id and the error text.

use crate::types::{ModRecord, VaultError};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkActionError {
    pub id: String,
    pub error: String,
}

impl BulkActionError {
    pub fn new(id: impl Into<String>, error: &VaultError) -> Self {
        Self {
            id: id.into(),
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkResult {
    pub success: Vec<String>,
    pub failures: Vec<BulkActionError>,
}

impl BulkResult {
    /// Runs `op` for every id and sorts the outcome into success and failure lists.
    pub fn collect<T>(ids: &[String], mut op: impl FnMut(&str) -> Result<T, VaultError>) -> Self {
        let mut result = Self::default();
        for id in ids {
            match op(id) {
                Ok(_) => result.success.push(id.clone()),
                Err(e) => {
                    log::warn!("Bulk item '{id}' failed: {e}");
                    result.failures.push(BulkActionError::new(id.as_str(), &e));
                }
            }
        }
        result
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    pub mods: Vec<ModRecord>,
    pub failures: Vec<BulkActionError>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RescanResult {
    /// Records created for payload groups nobody knew about.
    pub added: Vec<String>,
    /// Known records whose file list was reconciled.
    pub updated: Vec<String>,
    /// Records marked disabled because their active files are gone.
    pub disabled: Vec<String>,
    /// Records dropped because neither active files nor a backup exist.
    pub pruned: Vec<String>,
    /// Backup entries no record resolves to. Reported only, never removed.
    pub orphaned: Vec<String>,
    pub failures: Vec<BulkActionError>,
}
