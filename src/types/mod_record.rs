//! Persisted MOD record and its lifecycle state.
//!
//! A record is created on import (or when rescan finds an unknown payload group in the
//! active directory) and lives until `delete` or until rescan prunes it because neither
//! its active files nor its backup entry exist any more.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Timestamp format used for `import_date`.
pub const IMPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModRecord {
    /// Unique key. Derived from the payload base name, disambiguated on collision.
    pub id: String,
    /// Display name, user editable.
    pub name: String,
    /// Snapshot of the name at import time. Never changed afterwards.
    pub real_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub enabled: bool,
    /// Paths relative to the active directory, `/` separated, in install order.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub import_date: String,
    #[serde(default)]
    pub preview_image: Option<PathBuf>,
    #[serde(default)]
    pub source_archive: Option<PathBuf>,
    /// BLAKE3 of the source archive, used to flag repeated imports.
    #[serde(default)]
    pub source_hash: Option<String>,
    /// Per-mod folder under the active directory.
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub parent_archive: Option<String>,
    #[serde(default)]
    pub is_nested: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub has_folder_structure: bool,
}

impl ModRecord {
    pub fn new(id: &str, category: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            real_name: id.to_string(),
            category: category.to_string(),
            enabled: false,
            files: Vec::new(),
            size_bytes: 0,
            import_date: chrono::Local::now().format(IMPORT_DATE_FORMAT).to_string(),
            preview_image: None,
            source_archive: None,
            source_hash: None,
            folder_name: None,
            parent_archive: None,
            is_nested: false,
            is_virtual: false,
            has_folder_structure: false,
        }
    }

    /// Folder the record's files live in under the active directory.
    pub fn mod_folder(&self) -> &str {
        self.folder_name.as_deref().unwrap_or(&self.id)
    }

    /// Backup entry names to try when the exact id has no entry, in priority order:
    /// real name, folder name, display name. Duplicates and the id itself are skipped.
    pub fn backup_fallback_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let candidates = [
            Some(self.real_name.as_str()),
            self.folder_name.as_deref(),
            Some(self.name.as_str()),
        ];
        for candidate in candidates.into_iter().flatten() {
            if candidate.is_empty() || candidate == self.id {
                continue;
            }
            if !names.iter().any(|n| n == candidate) {
                names.push(candidate.to_string());
            }
        }
        names
    }
}
