//! Authoritative per-MOD payload storage.
//!
//! Layout: `<root>/<mod_id>/<file>` with payload files flattened to their names, an
//! optional `<root>/<mod_id>/.preview.<ext>`, and a `.manifest.json` mapping stored names
//! back to the original file names. Names that would collide inside an entry are stored
//! as `<stem>~N.<ext>`. The active directory can always be rebuilt from here.

use crate::services::fs_utils::file_utils::{copy_file_overwrite, prune_empty_dirs};
use crate::services::fs_utils::path_utils::resolve_record_path;
use crate::types::{ModRecord, VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const PREVIEW_STEM: &str = ".preview";
pub const MANIFEST_NAME: &str = ".manifest.json";
const PREVIEW_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "webp", "gif", "bmp", "dds"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupReport {
    pub copied: usize,
    pub failed: usize,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RestoreReport {
    /// Backup entry the files came from. Differs from the id when a fallback name matched.
    pub entry: String,
    /// Paths relative to the active directory, `/` separated.
    pub files: Vec<String>,
    pub copied: usize,
    pub failed: usize,
    pub messages: Vec<String>,
}

/// Stored payload files of an entry, in the order they were added.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    files: Vec<StoredFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredFile {
    stored: String,
    name: String,
}

pub struct BackupStore {
    root: PathBuf,
}

impl BackupStore {
    /// Opens (and creates if needed) the backup root. Failing to create it is a hard error.
    pub fn open(root: &Path) -> VaultResult<Self> {
        fs::create_dir_all(root).map_err(|e| VaultError::io_at("create backup root", root, e))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, name: &str) -> Option<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(self.root.join(name)),
            _ => None,
        }
    }

    fn entry_dir_checked(&self, mod_id: &str) -> VaultResult<PathBuf> {
        self.entry_dir(mod_id)
            .ok_or_else(|| VaultError::InvalidInput(format!("Invalid backup entry name '{mod_id}'")))
    }

    pub fn exists(&self, mod_id: &str) -> bool {
        self.entry_dir(mod_id).is_some_and(|d| d.is_dir())
    }

    /// Replaces the entry for `mod_id` with flattened copies of `files`.
    ///
    /// Same-named files from different folders are kept side by side under unique stored
    /// names; the manifest records their order so `restore` can put each one back. Per-file
    /// failures are counted. If no payload file could be copied the new entry is
    /// removed again and the call fails.
    pub fn add(&self, mod_id: &str, files: &[PathBuf], preview: Option<&Path>) -> VaultResult<BackupReport> {
        let dir = self.entry_dir_checked(mod_id)?;

        // The preview may live in the entry being replaced.
        let mut preview_note = None;
        let preview_bytes = match preview {
            Some(image) => match (preview_extension(image), fs::read(image)) {
                (Some(ext), Ok(bytes)) => Some((bytes, ext)),
                (None, _) => {
                    preview_note = Some(format!("Preview {} is not an image", image.display()));
                    None
                }
                (_, Err(e)) => {
                    preview_note = Some(format!("Preview {} unreadable: {e}", image.display()));
                    None
                }
            },
            None => None,
        };

        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| VaultError::io_at("clear backup", &dir, e))?;
        }
        fs::create_dir_all(&dir).map_err(|e| VaultError::io_at("create backup", &dir, e))?;

        let mut report = BackupReport::default();
        report.messages.extend(preview_note);
        let mut taken: HashSet<String> = HashSet::new();
        let mut manifest = Manifest::default();
        for file in files {
            let name = match file.file_name() {
                Some(name) => name.to_string_lossy().to_string(),
                None => continue,
            };
            let stored = stored_name(&name, &taken);
            taken.insert(stored.to_lowercase());
            if stored != name {
                log::debug!("Backup '{mod_id}': {} stored as '{stored}'", file.display());
            }
            match copy_file_overwrite(file, &dir.join(&stored)) {
                Ok(_) => {
                    report.copied += 1;
                    manifest.files.push(StoredFile { stored, name });
                }
                Err(e) => {
                    report.failed += 1;
                    report.messages.push(e.to_string());
                }
            }
        }

        if report.copied == 0 {
            let _ = fs::remove_dir_all(&dir);
            return Err(VaultError::BackupMissingOrEmpty(format!(
                "No payload file of '{mod_id}' could be backed up ({} failed)",
                report.failed
            )));
        }

        let manifest_path = dir.join(MANIFEST_NAME);
        if let Err(e) = serde_json::to_vec_pretty(&manifest)
            .map_err(VaultError::from)
            .and_then(|bytes| {
                fs::write(&manifest_path, bytes)
                    .map_err(|e| VaultError::io_at("write manifest", &manifest_path, e))
            })
        {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }

        if let Some((bytes, ext)) = preview_bytes {
            let target = dir.join(format!("{PREVIEW_STEM}.{ext}"));
            if let Err(e) = fs::write(&target, bytes) {
                report.messages.push(format!("Preview not stored: {e}"));
            }
        }

        for message in &report.messages {
            log::warn!("Backup '{mod_id}': {message}");
        }
        log::info!(
            "Backed up '{mod_id}': {} copied, {} failed",
            report.copied,
            report.failed
        );
        Ok(report)
    }

    /// Stores `image` as the entry's preview, replacing any previous one.
    pub fn set_preview(&self, mod_id: &str, image: &Path) -> VaultResult<PathBuf> {
        let dir = self.entry_dir_checked(mod_id)?;
        if !dir.is_dir() {
            return Err(VaultError::BackupMissingOrEmpty(format!(
                "No backup entry for '{mod_id}'"
            )));
        }
        let ext = preview_extension(image).ok_or_else(|| {
            VaultError::InvalidInput(format!("Preview {} is not an image", image.display()))
        })?;
        let bytes = fs::read(image).map_err(|e| VaultError::io_at("read preview", image, e))?;
        if let Some(old) = self.preview_path(mod_id) {
            fs::remove_file(&old).map_err(|e| VaultError::io_at("replace preview", &old, e))?;
        }
        let target = dir.join(format!("{PREVIEW_STEM}.{ext}"));
        fs::write(&target, bytes).map_err(|e| VaultError::io_at("write preview", &target, e))?;
        Ok(target)
    }

    pub fn preview_path(&self, mod_id: &str) -> Option<PathBuf> {
        let dir = self.entry_dir(mod_id)?;
        fs::read_dir(dir)
            .ok()?
            .flatten()
            .map(|e| e.path())
            .find(|p| p.is_file() && is_preview(p))
    }

    /// Backed-up payload files of an entry, sorted, preview excluded.
    pub fn payload_files(&self, mod_id: &str) -> VaultResult<Vec<PathBuf>> {
        let dir = self.entry_dir_checked(mod_id)?;
        let entries = fs::read_dir(&dir).map_err(|e| VaultError::io_at("read backup", &dir, e))?;
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && !is_reserved(p))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Payload files of an entry paired with their original names, in the order they
    /// were added. Files the manifest does not know keep their stored name.
    fn stored_payload(&self, entry: &str) -> VaultResult<Vec<(PathBuf, String)>> {
        let dir = self.entry_dir_checked(entry)?;
        let on_disk = self.payload_files(entry)?;
        let manifest: Manifest = match fs::read(dir.join(MANIFEST_NAME)) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!("Backup '{entry}': unreadable manifest ({e}); using stored names");
                Manifest::default()
            }),
            Err(_) => Manifest::default(),
        };

        let mut out: Vec<(PathBuf, String)> = manifest
            .files
            .into_iter()
            .map(|f| (dir.join(&f.stored), f.name))
            .filter(|(path, _)| on_disk.contains(path))
            .collect();
        for path in on_disk {
            if out.iter().any(|(known, _)| *known == path) {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            out.push((path, name));
        }
        Ok(out)
    }

    /// Finds the entry holding a record's payload: exact id first, then real name,
    /// folder name and display name.
    pub fn resolve_entry(&self, record: &ModRecord) -> Option<String> {
        std::iter::once(record.id.clone())
            .chain(record.backup_fallback_names())
            .find(|name| self.exists(name))
    }

    /// Copies a record's backed-up payload into `active_dir`.
    ///
    /// A file goes back to its recorded relative path when the record lists a file of
    /// that name, otherwise into `<active_dir>/<mod_folder>/`. If nothing is copied, any
    /// folder created for it is removed and the call fails.
    pub fn restore(&self, record: &ModRecord, active_dir: &Path) -> VaultResult<RestoreReport> {
        let entry = self.resolve_entry(record).ok_or_else(|| {
            VaultError::BackupMissingOrEmpty(format!("No backup entry for '{}'", record.id))
        })?;
        if entry != record.id {
            log::info!("Restoring '{}' from fallback entry '{entry}'", record.id);
        }

        let payload = self.stored_payload(&entry)?;
        if payload.is_empty() {
            return Err(VaultError::BackupMissingOrEmpty(format!(
                "Backup entry '{entry}' holds no payload"
            )));
        }

        let mod_dir = resolve_record_path(active_dir, record.mod_folder())?;
        let created_mod_dir = !mod_dir.exists();

        let mut report = RestoreReport {
            entry,
            ..Default::default()
        };
        let mut claimed = vec![false; record.files.len()];
        let mut touched_dirs: Vec<PathBuf> = Vec::new();
        for (source, name) in &payload {
            // Same-named files go back to the recorded paths in install order.
            let recorded = record
                .files
                .iter()
                .enumerate()
                .find(|(i, f)| !claimed[*i] && f.rsplit('/').next() == Some(name.as_str()));
            let relative = match recorded {
                Some((i, f)) => {
                    claimed[i] = true;
                    f.clone()
                }
                None => format!("{}/{name}", record.mod_folder()),
            };

            let target = match resolve_record_path(active_dir, &relative) {
                Ok(target) => target,
                Err(e) => {
                    report.failed += 1;
                    report.messages.push(e.to_string());
                    continue;
                }
            };
            if let Some(parent) = target.parent() {
                touched_dirs.push(parent.to_path_buf());
            }
            match copy_file_overwrite(source, &target) {
                Ok(_) => {
                    report.copied += 1;
                    report.files.push(relative);
                }
                Err(e) => {
                    report.failed += 1;
                    report.messages.push(e.to_string());
                }
            }
        }

        if report.copied == 0 {
            if created_mod_dir && mod_dir.exists() {
                let _ = fs::remove_dir_all(&mod_dir);
            }
            for dir in &touched_dirs {
                prune_empty_dirs(dir, active_dir);
            }
            return Err(VaultError::PartialCopyFailure {
                copied: 0,
                failed: report.failed,
                detail: report.messages.join("; "),
            });
        }

        for message in &report.messages {
            log::warn!("Restore '{}': {message}", record.id);
        }
        Ok(report)
    }

    /// Deletes the whole entry. A missing entry is not an error.
    pub fn remove(&self, mod_id: &str) -> VaultResult<()> {
        let dir = self.entry_dir_checked(mod_id)?;
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| VaultError::io_at("remove backup", &dir, e))?;
            log::info!("Removed backup entry '{mod_id}'");
        }
        Ok(())
    }

    /// Names of all entries, sorted. Hidden directories are skipped.
    pub fn list_ids(&self) -> VaultResult<Vec<String>> {
        let entries =
            fs::read_dir(&self.root).map_err(|e| VaultError::io_at("read backup root", &self.root, e))?;
        let mut ids: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| !name.starts_with('.'))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

fn preview_extension(image: &Path) -> Option<String> {
    image
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| PREVIEW_EXTENSIONS.contains(&e.as_str()))
}

fn is_preview(path: &Path) -> bool {
    let stem_matches = path
        .file_stem()
        .is_some_and(|s| s.to_string_lossy().eq_ignore_ascii_case(PREVIEW_STEM));
    stem_matches && preview_extension(path).is_some()
}

/// Entry files that are not payload: the preview and the manifest.
fn is_reserved(path: &Path) -> bool {
    is_preview(path)
        || path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(MANIFEST_NAME))
}

/// `name` itself, or `<stem>~N.<ext>` when `name` is reserved or already taken
/// (case-insensitively) in the entry.
fn stored_name(name: &str, taken: &HashSet<String>) -> String {
    let free = |candidate: &str| {
        !taken.contains(&candidate.to_lowercase()) && !is_reserved(Path::new(candidate))
    };
    if free(name) {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = format!("{stem}~{n}{ext}");
        if free(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
#[path = "tests/backup_tests.rs"]
mod tests;
