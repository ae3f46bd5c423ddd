pub mod models;

pub use models::*;

use crate::types::{Category, ModRecord, VaultError, VaultResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Accessor/mutator contract for persisted MOD and category state.
///
/// The engine never writes the state file itself; it only goes through this trait.
/// Paths are read through it at the start of every high-level operation so a path
/// change takes effect on the next call.
pub trait ConfigStore: Send + Sync {
    fn get_mods(&self) -> Vec<ModRecord>;

    fn get_mod(&self, id: &str) -> Option<ModRecord> {
        self.get_mods().into_iter().find(|m| m.id == id)
    }

    /// Insert a record, replacing any record with the same id.
    fn add_mod(&self, record: ModRecord) -> VaultResult<()>;

    /// Replace an existing record. Fails with `NotFound` if the id is unknown.
    fn update_mod(&self, record: &ModRecord) -> VaultResult<()>;

    fn update_mods(&self, records: &[ModRecord]) -> VaultResult<()> {
        for record in records {
            self.update_mod(record)?;
        }
        Ok(())
    }

    /// Remove a record. Removing an unknown id is not an error.
    fn remove_mod(&self, id: &str) -> VaultResult<()>;

    fn get_categories(&self) -> Vec<Category>;

    fn set_categories(&self, categories: Vec<Category>) -> VaultResult<()>;

    fn get_backup_path(&self) -> Option<PathBuf>;

    fn get_active_mods_path(&self) -> Option<PathBuf>;

    /// Directory for engine-owned data: default backup root and scratch space.
    fn data_dir(&self) -> PathBuf;

    /// Persist anything still buffered. Called once at shutdown.
    fn flush(&self) -> VaultResult<()> {
        Ok(())
    }
}

/// `ConfigStore` backed by a single `config.json`.
///
/// Every mutation is written through before returning, using a temp file and rename.
pub struct JsonConfigStore {
    config_path: PathBuf,
    settings: Mutex<AppSettings>,
}

impl JsonConfigStore {
    /// Load from `config_path`, falling back to defaults when the file is missing or malformed.
    pub fn new(config_path: PathBuf) -> Self {
        let settings = load_settings(&config_path);
        Self {
            config_path,
            settings: Mutex::new(settings),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn get_settings(&self) -> AppSettings {
        self.lock().clone()
    }

    pub fn save_settings(&self, new_settings: AppSettings) -> VaultResult<()> {
        write_settings_atomic(&self.config_path, &new_settings)?;
        *self.lock() = new_settings;
        Ok(())
    }

    pub fn set_active_mods_path(&self, path: impl Into<PathBuf>) -> VaultResult<()> {
        let path = path.into();
        self.mutate(|s| {
            s.active_mods_path = Some(path);
            s.initialized = true;
            Ok(())
        })
    }

    pub fn set_backup_path(&self, path: impl Into<PathBuf>) -> VaultResult<()> {
        let path = path.into();
        self.mutate(|s| {
            s.backup_path = Some(path);
            Ok(())
        })
    }

    fn lock(&self) -> MutexGuard<'_, AppSettings> {
        self.settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `f` to a copy of the settings, persist it, then publish it.
    /// If `f` or the write fails, the in-memory state is left untouched.
    fn mutate<R>(&self, f: impl FnOnce(&mut AppSettings) -> VaultResult<R>) -> VaultResult<R> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        write_settings_atomic(&self.config_path, &next)?;
        *guard = next;
        Ok(out)
    }
}

impl ConfigStore for JsonConfigStore {
    fn get_mods(&self) -> Vec<ModRecord> {
        self.lock().mods.clone()
    }

    fn get_mod(&self, id: &str) -> Option<ModRecord> {
        self.lock().mods.iter().find(|m| m.id == id).cloned()
    }

    fn add_mod(&self, record: ModRecord) -> VaultResult<()> {
        self.mutate(|s| {
            match s.mods.iter_mut().find(|m| m.id == record.id) {
                Some(existing) => *existing = record,
                None => s.mods.push(record),
            }
            Ok(())
        })
    }

    fn update_mod(&self, record: &ModRecord) -> VaultResult<()> {
        self.mutate(|s| {
            let existing = s
                .mods
                .iter_mut()
                .find(|m| m.id == record.id)
                .ok_or_else(|| VaultError::NotFound(format!("Mod '{}'", record.id)))?;
            *existing = record.clone();
            Ok(())
        })
    }

    fn update_mods(&self, records: &[ModRecord]) -> VaultResult<()> {
        self.mutate(|s| {
            for record in records {
                let existing = s
                    .mods
                    .iter_mut()
                    .find(|m| m.id == record.id)
                    .ok_or_else(|| VaultError::NotFound(format!("Mod '{}'", record.id)))?;
                *existing = record.clone();
            }
            Ok(())
        })
    }

    fn remove_mod(&self, id: &str) -> VaultResult<()> {
        self.mutate(|s| {
            s.mods.retain(|m| m.id != id);
            Ok(())
        })
    }

    fn get_categories(&self) -> Vec<Category> {
        self.lock().categories.clone()
    }

    fn set_categories(&self, categories: Vec<Category>) -> VaultResult<()> {
        self.mutate(|s| {
            s.categories = categories;
            Ok(())
        })
    }

    fn get_backup_path(&self) -> Option<PathBuf> {
        self.lock()
            .backup_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn get_active_mods_path(&self) -> Option<PathBuf> {
        self.lock()
            .active_mods_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
    }

    fn data_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn flush(&self) -> VaultResult<()> {
        let snapshot = self.lock().clone();
        write_settings_atomic(&self.config_path, &snapshot)
    }
}

// ── Helpers ──────────────────────────────────────────

fn load_settings(config_path: &Path) -> AppSettings {
    let raw = match fs::read_to_string(config_path) {
        Ok(raw) => raw,
        Err(_) => return AppSettings::default(),
    };
    match serde_json::from_str(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!(
                "Failed to parse config {}: {e}. Using defaults.",
                config_path.display()
            );
            AppSettings::default()
        }
    }
}

fn temp_path_for(file_path: &Path) -> PathBuf {
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "config.json".to_string());
    file_path.with_file_name(format!("{file_name}.tmp"))
}

fn write_settings_atomic(config_path: &Path, settings: &AppSettings) -> VaultResult<()> {
    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| VaultError::io_at("create config dir", parent, e))?;
        }
    }

    let json = serde_json::to_string_pretty(settings)?;
    let temp_path = temp_path_for(config_path);
    fs::write(&temp_path, json).map_err(|e| VaultError::io_at("write", &temp_path, e))?;

    match fs::rename(&temp_path, config_path) {
        Ok(_) => Ok(()),
        Err(_) => {
            if config_path.exists() {
                fs::remove_file(config_path)
                    .map_err(|e| VaultError::io_at("replace", config_path, e))?;
            }
            fs::rename(&temp_path, config_path)
                .map_err(|e| VaultError::io_at("finalize", config_path, e))
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
