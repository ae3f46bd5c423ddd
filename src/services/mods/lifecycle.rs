//! MOD lifecycle: import, enable, disable, delete and rescan.
//!
//! Every operation reads the active and backup paths from the [`ConfigStore`] when it
//! starts. Records only change after the filesystem step they describe has succeeded, so
//! an enabled record always has its files in the active directory and a record is never
//! marked enabled before its backup exists.

use super::backup::BackupStore;
use super::bulk::{BulkActionError, BulkResult, ImportResult, RescanResult};
use super::detector::{ModCandidate, ModDetector};
use crate::services::archive::{ArchiveExtractor, BackendRegistry};
use crate::services::categories::CategoryRegistry;
use crate::services::config::ConfigStore;
use crate::services::fs_utils::file_utils::{
    copy_file_overwrite, move_file, prune_empty_dirs, relative_slash,
};
use crate::services::fs_utils::path_utils::resolve_record_path;
use crate::services::fs_utils::scratch::ScratchRegistry;
use crate::types::{ModRecord, VaultError, VaultResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Backup root used when none is configured, relative to the store's data directory.
pub const DEFAULT_BACKUP_DIR: &str = "modbackup";

pub struct ModLifecycleManager {
    config: Arc<dyn ConfigStore>,
    extractor: ArchiveExtractor,
    detector: ModDetector,
    categories: CategoryRegistry,
    scratch: ScratchRegistry,
}

/// Files of one candidate after they were placed into the active directory.
struct Installed {
    files: Vec<String>,
    /// Absolute paths of the placed files, parallel to `files`.
    placed: Vec<PathBuf>,
    size_bytes: u64,
    has_folder_structure: bool,
}

impl ModLifecycleManager {
    pub fn new(config: Arc<dyn ConfigStore>, registry: BackendRegistry) -> Self {
        Self::with_detector(config, registry, ModDetector::default())
    }

    pub fn with_detector(
        config: Arc<dyn ConfigStore>,
        registry: BackendRegistry,
        detector: ModDetector,
    ) -> Self {
        let scratch = ScratchRegistry::new(&config.data_dir());
        let swept = scratch.sweep_leftovers();
        if swept > 0 {
            log::warn!("Removed {swept} leftover scratch dir(s) from a previous run");
        }
        Self {
            categories: CategoryRegistry::new(Arc::clone(&config)),
            extractor: ArchiveExtractor::new(registry),
            detector,
            scratch,
            config,
        }
    }

    pub fn config(&self) -> &Arc<dyn ConfigStore> {
        &self.config
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    pub fn scratch(&self) -> &ScratchRegistry {
        &self.scratch
    }

    fn active_dir(&self) -> VaultResult<PathBuf> {
        self.config.get_active_mods_path().ok_or_else(|| {
            VaultError::ConfigurationMissing("Active mods path is not configured".to_string())
        })
    }

    fn backup_store(&self) -> VaultResult<BackupStore> {
        let root = match self.config.get_backup_path() {
            Some(root) => root,
            None => {
                let fallback = self.config.data_dir().join(DEFAULT_BACKUP_DIR);
                log::warn!(
                    "Backup path is not configured; using {}",
                    fallback.display()
                );
                fallback
            }
        };
        BackupStore::open(&root)
    }

    fn require(&self, id: &str) -> VaultResult<ModRecord> {
        self.config
            .get_mod(id)
            .ok_or_else(|| VaultError::NotFound(format!("Mod '{id}'")))
    }

    pub fn list(&self) -> Vec<ModRecord> {
        self.config.get_mods()
    }

    pub fn get(&self, id: &str) -> VaultResult<ModRecord> {
        self.require(id)
    }

    /// Imports every payload group found in `archive`.
    ///
    /// Each candidate is installed and backed up on its own; a failing candidate is
    /// reported in `failures` and the rest continue. An archive without any group is
    /// imported as one virtual MOD.
    pub fn import(&self, archive: &Path, category: &str) -> VaultResult<ImportResult> {
        let active = self.active_dir()?;
        let backup = self.backup_store()?;
        fs::create_dir_all(&active)
            .map_err(|e| VaultError::io_at("create active dir", &active, e))?;
        let category = self.categories.ensure(category)?;

        let scratch = self.scratch.create("import")?;
        let report = self.extractor.extract(archive, scratch.path())?;
        let mut result = ImportResult {
            warnings: report.warnings.clone(),
            ..Default::default()
        };

        if let Some(hash) = &report.source_hash {
            let previous: Vec<String> = self
                .config
                .get_mods()
                .into_iter()
                .filter(|m| m.source_hash.as_deref() == Some(hash.as_str()))
                .map(|m| m.id)
                .collect();
            if !previous.is_empty() {
                let warning = format!(
                    "{} was imported before (as {})",
                    archive.display(),
                    previous.join(", ")
                );
                log::warn!("{warning}");
                result.warnings.push(warning);
            }
        }

        let mut candidates = self.detector.find_groups(scratch.path())?;
        for candidate in candidates.iter_mut() {
            candidate.source_archive = Some(archive.to_path_buf());
            if let Some(origin) = report.nested_origin(&candidate.dir) {
                candidate.is_nested = true;
                candidate.parent_archive = Some(origin.archive_name.clone());
            }
        }
        if candidates.is_empty() {
            let warning = VaultError::NoPayloadFound(format!(
                "{} has no complete payload group; imported as a virtual MOD",
                archive.display()
            ));
            log::warn!("{warning}");
            result.warnings.push(warning.to_string());
            candidates.push(self.detector.synthesize_virtual(archive, scratch.path())?);
        }

        for candidate in &candidates {
            match self.install_candidate(
                &active,
                &backup,
                candidate,
                &category,
                report.source_hash.as_deref(),
                scratch.path(),
            ) {
                Ok((record, warnings)) => {
                    result.warnings.extend(warnings);
                    result.mods.push(record);
                }
                Err(e) => {
                    log::warn!("Import of '{}' failed: {e}", candidate.id);
                    result.failures.push(BulkActionError::new(candidate.id.as_str(), &e));
                }
            }
        }

        log::info!(
            "Imported {}: {} mod(s), {} failure(s)",
            archive.display(),
            result.mods.len(),
            result.failures.len()
        );
        Ok(result)
    }

    /// Places one candidate, backs it up and records it. Degraded backups come back as
    /// warnings next to the record.
    fn install_candidate(
        &self,
        active: &Path,
        backup: &BackupStore,
        candidate: &ModCandidate,
        category: &str,
        source_hash: Option<&str>,
        scratch: &Path,
    ) -> VaultResult<(ModRecord, Vec<String>)> {
        let existing = self.config.get_mod(&candidate.id);
        let mut preview = None;
        if let Some(old) = &existing {
            log::info!("Re-importing '{}'; replacing the installed copy", old.id);
            remove_active_files(active, old)?;
            preview = backup
                .resolve_entry(old)
                .and_then(|entry| backup.preview_path(&entry));
        }

        let installed = place_candidate(active, candidate, scratch)?;

        let mut record = ModRecord::new(&candidate.id, category);
        record.name = candidate.base_name.clone();
        record.real_name = candidate.base_name.clone();
        record.files = installed.files.clone();
        record.size_bytes = installed.size_bytes;
        record.source_archive = candidate.source_archive.clone();
        record.source_hash = source_hash.map(str::to_string);
        record.parent_archive = candidate.parent_archive.clone();
        record.is_nested = candidate.is_nested;
        record.is_virtual = candidate.is_virtual;
        record.has_folder_structure = installed.has_folder_structure;
        if let Some(old) = &existing {
            record.name = old.name.clone();
            record.real_name = old.real_name.clone();
            record.category = old.category.clone();
        }

        let stored = match backup.add(&record.id, &installed.placed, preview.as_deref()) {
            Ok(stored) => stored,
            Err(e) => {
                discard_files(active, &record);
                return Err(e);
            }
        };
        record.preview_image = backup.preview_path(&record.id);
        let warnings: Vec<String> = stored
            .messages
            .iter()
            .map(|m| format!("Backup of '{}': {m}", record.id))
            .collect();

        record.enabled = true;
        if let Err(e) = self.config.add_mod(record.clone()) {
            discard_files(active, &record);
            return Err(e);
        }
        log::info!(
            "Installed '{}' ({} file(s), category '{}')",
            record.id,
            record.files.len(),
            record.category
        );
        Ok((record, warnings))
    }

    /// Restores a record's payload from backup into the active directory.
    /// The record only becomes enabled if the restore copied at least one file.
    pub fn enable(&self, id: &str) -> VaultResult<ModRecord> {
        let active = self.active_dir()?;
        let backup = self.backup_store()?;
        let record = self.require(id)?;
        fs::create_dir_all(&active)
            .map_err(|e| VaultError::io_at("create active dir", &active, e))?;

        let report = backup.restore(&record, &active)?;

        let mut files = record.files.clone();
        for restored in &report.files {
            if !files.contains(restored) {
                files.push(restored.clone());
            }
        }
        let mut updated = record.clone();
        updated.files = files;
        updated.enabled = true;
        updated.size_bytes = existing_size(&active, &updated);

        if let Err(e) = self.config.update_mod(&updated) {
            let mut restored = record.clone();
            restored.files = report.files.clone();
            discard_files(&active, &restored);
            return Err(e);
        }
        log::info!(
            "Enabled '{id}' ({} copied, {} failed)",
            report.copied,
            report.failed
        );
        Ok(updated)
    }

    /// Removes a record's files from the active directory. The backup is never touched.
    pub fn disable(&self, id: &str) -> VaultResult<ModRecord> {
        let active = self.active_dir()?;
        let mut record = self.require(id)?;
        let removed = remove_active_files(&active, &record)?;
        record.enabled = false;
        self.config.update_mod(&record)?;
        log::info!("Disabled '{id}' ({removed} file(s) removed)");
        Ok(record)
    }

    /// Disables (best-effort), removes the backup entry, then drops the record.
    pub fn delete(&self, id: &str) -> VaultResult<()> {
        let record = self.require(id)?;
        let backup = self.backup_store()?;
        match self.active_dir() {
            Ok(active) => {
                if let Err(e) = remove_active_files(&active, &record) {
                    log::warn!("Delete '{id}': {e}");
                }
            }
            Err(e) => log::warn!("Delete '{id}': {e}"),
        }

        if let Some(entry) = backup.resolve_entry(&record) {
            // A fallback name may belong to another record's entry.
            if entry == record.id || self.config.get_mod(&entry).is_none() {
                backup.remove(&entry)?;
            }
        }
        self.config.remove_mod(id)?;
        log::info!("Deleted '{id}'");
        Ok(())
    }

    /// Reconciles the records with what is actually in the active directory.
    ///
    /// Known records keep their display name, category and preview. Records whose files
    /// are gone are marked disabled, or pruned when their backup is gone as well. Groups
    /// nobody knows about become new records, backed up on the spot.
    pub fn rescan(&self) -> VaultResult<RescanResult> {
        let active = self.active_dir()?;
        let backup = self.backup_store()?;
        let groups = if active.is_dir() {
            self.detector.find_groups(&active)?
        } else {
            Vec::new()
        };
        let group_files: Vec<Vec<String>> = groups
            .iter()
            .map(|g| g.files().filter_map(|f| relative_slash(&active, f)).collect())
            .collect();

        let mut result = RescanResult::default();
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut changed: Vec<ModRecord> = Vec::new();

        for record in self.config.get_mods() {
            let matched = (0..groups.len())
                .filter(|i| !claimed.contains(i))
                .find(|i| group_files[*i].iter().any(|f| record.files.contains(f)))
                .or_else(|| {
                    (0..groups.len())
                        .filter(|i| !claimed.contains(i))
                        .find(|i| groups[*i].id == record.id)
                });

            match matched {
                Some(i) => {
                    claimed.insert(i);
                    let mut files: Vec<String> = record
                        .files
                        .iter()
                        .filter(|f| group_files[i].contains(f) || file_exists(&active, f))
                        .cloned()
                        .collect();
                    for f in &group_files[i] {
                        if !files.contains(f) {
                            files.push(f.clone());
                        }
                    }
                    let mut updated = record.clone();
                    updated.files = files;
                    updated.enabled = true;
                    updated.size_bytes = existing_size(&active, &updated);
                    if updated != record {
                        result.updated.push(record.id.clone());
                        changed.push(updated);
                    }
                }
                None => {
                    let present = record.files.iter().any(|f| file_exists(&active, f));
                    if present {
                        continue;
                    }
                    if backup.resolve_entry(&record).is_none() {
                        match self.config.remove_mod(&record.id) {
                            Ok(_) => {
                                log::info!("Pruned '{}': no active files and no backup", record.id);
                                result.pruned.push(record.id.clone());
                            }
                            Err(e) => result.failures.push(BulkActionError::new(record.id.as_str(), &e)),
                        }
                    } else if record.enabled {
                        let mut updated = record.clone();
                        updated.enabled = false;
                        result.disabled.push(record.id.clone());
                        changed.push(updated);
                    }
                }
            }
        }

        if !changed.is_empty() {
            if let Err(e) = self.config.update_mods(&changed) {
                for record in &changed {
                    result.failures.push(BulkActionError::new(record.id.as_str(), &e));
                }
                result.updated.clear();
                result.disabled.clear();
            }
        }

        for (i, group) in groups.iter().enumerate() {
            if claimed.contains(&i) {
                continue;
            }
            match self.adopt_group(&active, &backup, group, &group_files[i]) {
                Ok(record) => result.added.push(record.id),
                Err(e) => {
                    log::warn!("Rescan could not adopt '{}': {e}", group.id);
                    result.failures.push(BulkActionError::new(group.id.as_str(), &e));
                }
            }
        }

        result.orphaned = orphaned_entries(&backup, &self.config.get_mods())?;
        for entry in &result.orphaned {
            log::warn!("Backup entry '{entry}' belongs to no record");
        }

        log::info!(
            "Rescan of {}: {} added, {} updated, {} disabled, {} pruned, {} failure(s)",
            active.display(),
            result.added.len(),
            result.updated.len(),
            result.disabled.len(),
            result.pruned.len(),
            result.failures.len()
        );
        Ok(result)
    }

    /// Records a payload group that was placed into the active directory by hand.
    fn adopt_group(
        &self,
        active: &Path,
        backup: &BackupStore,
        group: &ModCandidate,
        files: &[String],
    ) -> VaultResult<ModRecord> {
        let mut id = group.id.clone();
        let mut n = 2;
        while self.config.get_mod(&id).is_some() || backup.exists(&id) {
            id = format!("{}_{n}", group.id);
            n += 1;
        }

        let mut record = ModRecord::new(&id, &self.categories.default_name());
        record.name = group.base_name.clone();
        record.real_name = group.base_name.clone();
        record.files = files.to_vec();
        record.folder_name = relative_slash(active, &group.dir).filter(|f| !f.is_empty());
        record.size_bytes = group.size_bytes();
        record.enabled = true;

        let sources: Vec<PathBuf> = group.files().cloned().collect();
        backup.add(&id, &sources, None)?;
        self.config.add_mod(record.clone())?;
        log::info!("Rescan adopted '{id}' from {}", group.dir.display());
        Ok(record)
    }

    /// Changes the display name. The real name recorded at import stays as it was.
    pub fn rename(&self, id: &str, display_name: &str) -> VaultResult<ModRecord> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(VaultError::InvalidInput(
                "Display name cannot be empty".to_string(),
            ));
        }
        let mut record = self.require(id)?;
        record.name = name.to_string();
        self.config.update_mod(&record)?;
        Ok(record)
    }

    pub fn set_preview(&self, id: &str, image: &Path) -> VaultResult<ModRecord> {
        let backup = self.backup_store()?;
        let mut record = self.require(id)?;
        let entry = backup.resolve_entry(&record).ok_or_else(|| {
            VaultError::BackupMissingOrEmpty(format!("No backup entry for '{id}'"))
        })?;
        record.preview_image = Some(backup.set_preview(&entry, image)?);
        self.config.update_mod(&record)?;
        Ok(record)
    }

    pub fn set_category(&self, id: &str, category: &str) -> VaultResult<ModRecord> {
        self.categories.set_member_category(id, category)
    }

    pub fn bulk_enable(&self, ids: &[String]) -> BulkResult {
        BulkResult::collect(ids, |id| self.enable(id))
    }

    pub fn bulk_disable(&self, ids: &[String]) -> BulkResult {
        BulkResult::collect(ids, |id| self.disable(id))
    }
}

/// Places a candidate's files under `<active>/<id>/`. Regular groups are flattened;
/// virtual candidates keep their layout relative to the extracted root. Files inside
/// scratch space are moved, anything else (a raw archive outside it) is copied.
fn place_candidate(
    active: &Path,
    candidate: &ModCandidate,
    scratch: &Path,
) -> VaultResult<Installed> {
    let mut installed = Installed {
        files: Vec::new(),
        placed: Vec::new(),
        size_bytes: 0,
        has_folder_structure: false,
    };
    let mut messages = Vec::new();

    for source in candidate.files() {
        let inner = if candidate.is_virtual {
            relative_slash(&candidate.root, source)
        } else {
            source.file_name().map(|n| n.to_string_lossy().to_string())
        };
        let inner = match inner {
            Some(inner) if !inner.is_empty() => inner,
            _ => {
                messages.push(format!("Cannot place {}", source.display()));
                continue;
            }
        };
        let relative = format!("{}/{inner}", candidate.id);
        let placed = resolve_record_path(active, &relative).and_then(|target| {
            let bytes = if source.starts_with(scratch) {
                move_file(source, &target)?
            } else {
                copy_file_overwrite(source, &target)?
            };
            Ok((target, bytes))
        });
        match placed {
            Ok((target, bytes)) => {
                installed.has_folder_structure |= inner.contains('/');
                installed.size_bytes += bytes;
                installed.files.push(relative);
                installed.placed.push(target);
            }
            Err(e) => messages.push(e.to_string()),
        }
    }

    if installed.files.is_empty() {
        if let Ok(dir) = resolve_record_path(active, &candidate.id) {
            if dir.is_dir() {
                let _ = fs::remove_dir_all(&dir);
            }
        }
        return Err(VaultError::PartialCopyFailure {
            copied: 0,
            failed: messages.len(),
            detail: messages.join("; "),
        });
    }
    for message in &messages {
        log::warn!("Install '{}': {message}", candidate.id);
    }
    Ok(installed)
}

/// Deletes a record's files from the active directory and prunes emptied folders.
/// Files that are already gone count as removed.
fn remove_active_files(active: &Path, record: &ModRecord) -> VaultResult<usize> {
    let mut removed = 0;
    let mut failures = Vec::new();
    let mut parents: Vec<PathBuf> = Vec::new();

    for relative in &record.files {
        let path = match resolve_record_path(active, relative) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Skipping file of '{}': {e}", record.id);
                continue;
            }
        };
        match fs::remove_file(&path) {
            Ok(_) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                failures.push(format!("{}: {e}", path.display()));
                continue;
            }
        }
        if let Some(parent) = path.parent() {
            if !parents.iter().any(|p| p == parent) {
                parents.push(parent.to_path_buf());
            }
        }
    }
    for parent in &parents {
        prune_empty_dirs(parent, active);
    }

    if !failures.is_empty() {
        return Err(VaultError::Io(format!(
            "{} file(s) of '{}' could not be removed: {}",
            failures.len(),
            record.id,
            failures.join("; ")
        )));
    }
    Ok(removed)
}

/// Backup entries that neither a record id nor any record's fallback name resolves to.
fn orphaned_entries(backup: &BackupStore, records: &[ModRecord]) -> VaultResult<Vec<String>> {
    let owned: HashSet<String> = records
        .iter()
        .filter_map(|record| backup.resolve_entry(record))
        .collect();
    Ok(backup
        .list_ids()?
        .into_iter()
        .filter(|id| !owned.contains(id))
        .collect())
}

fn discard_files(active: &Path, record: &ModRecord) {
    if let Err(e) = remove_active_files(active, record) {
        log::warn!("Cleanup of '{}' incomplete: {e}", record.id);
    }
}

fn file_exists(active: &Path, relative: &str) -> bool {
    resolve_record_path(active, relative).is_ok_and(|p| p.is_file())
}

fn existing_size(active: &Path, record: &ModRecord) -> u64 {
    record
        .files
        .iter()
        .filter_map(|f| resolve_record_path(active, f).ok())
        .filter_map(|p| fs::metadata(p).ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
