//! Payload-group detection.
//!
//! A MOD is recognized by three co-located files sharing one base name with the three
//! extensions of a [`PayloadSpec`]. The files themselves are never opened.

use crate::services::archive::is_nested_archive_candidate;
use crate::services::fs_utils::file_utils::list_files;
use crate::services::fs_utils::path_utils::safe_dir_name;
use crate::types::{VaultError, VaultResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// The three extensions that make up one payload group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSpec {
    pub container: String,
    pub index: String,
    pub store: String,
}

impl Default for PayloadSpec {
    fn default() -> Self {
        Self {
            container: "pak".to_string(),
            index: "utoc".to_string(),
            store: "ucas".to_string(),
        }
    }
}

impl PayloadSpec {
    /// Slot of `path` in the triple (0 container, 1 index, 2 store), matched case-insensitively.
    fn slot(&self, path: &Path) -> Option<usize> {
        let ext = path.extension()?.to_str()?;
        [&self.container, &self.index, &self.store]
            .iter()
            .position(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn is_payload_file(&self, path: &Path) -> bool {
        self.slot(path).is_some()
    }
}

/// A MOD found on disk but not yet installed or recorded.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModCandidate {
    pub id: String,
    pub base_name: String,
    /// Tree the candidate was found in. Relative paths are computed against it.
    pub root: PathBuf,
    /// Directory holding the group.
    pub dir: PathBuf,
    /// Container, index and store files, in that order. Empty for virtual candidates.
    pub primary: Vec<PathBuf>,
    pub auxiliary: Vec<PathBuf>,
    pub source_archive: Option<PathBuf>,
    pub parent_archive: Option<String>,
    pub is_nested: bool,
    pub is_virtual: bool,
}

impl ModCandidate {
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.primary.iter().chain(self.auxiliary.iter())
    }

    pub fn size_bytes(&self) -> u64 {
        self.files()
            .filter_map(|f| fs::metadata(f).ok())
            .map(|m| m.len())
            .sum()
    }
}

/// Group under construction: base name plus one slot per extension.
struct PartialGroup {
    base: String,
    dir: PathBuf,
    slots: [Option<PathBuf>; 3],
}

#[derive(Debug, Clone, Default)]
pub struct ModDetector {
    spec: PayloadSpec,
}

impl ModDetector {
    pub fn new(spec: PayloadSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &PayloadSpec {
        &self.spec
    }

    /// Every complete payload group under `root`, with co-located files attached.
    ///
    /// Incomplete groups are ignored. Output is sorted by directory, then base name.
    pub fn find_groups(&self, root: &Path) -> VaultResult<Vec<ModCandidate>> {
        if !root.is_dir() {
            return Err(VaultError::NotFound(format!("Directory {}", root.display())));
        }

        let mut by_dir: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
        for file in list_files(root)? {
            let dir = file.parent().unwrap_or(root).to_path_buf();
            by_dir.entry(dir).or_default().push(file);
        }

        let mut candidates = Vec::new();
        for (dir, files) in by_dir {
            candidates.extend(self.groups_in_dir(root, &dir, &files));
        }

        assign_ids(root, &mut candidates);
        log::debug!(
            "Detected {} payload group(s) under {}",
            candidates.len(),
            root.display()
        );
        Ok(candidates)
    }

    fn groups_in_dir(&self, root: &Path, dir: &Path, files: &[PathBuf]) -> Vec<ModCandidate> {
        let mut partial: BTreeMap<String, PartialGroup> = BTreeMap::new();
        for file in files {
            let slot = match self.spec.slot(file) {
                Some(slot) => slot,
                None => continue,
            };
            let base = match file.file_stem().and_then(|s| s.to_str()) {
                Some(base) if !base.is_empty() => base.to_string(),
                _ => continue,
            };
            let group = partial.entry(base.clone()).or_insert_with(|| PartialGroup {
                base,
                dir: dir.to_path_buf(),
                slots: [None, None, None],
            });
            group.slots[slot] = Some(file.clone());
        }

        let mut complete: Vec<ModCandidate> = partial
            .into_values()
            .filter_map(|g| {
                let [a, b, c] = g.slots;
                let primary = vec![a?, b?, c?];
                Some(ModCandidate {
                    id: String::new(),
                    base_name: g.base,
                    root: root.to_path_buf(),
                    dir: g.dir,
                    primary,
                    auxiliary: Vec::new(),
                    source_archive: None,
                    parent_archive: None,
                    is_nested: false,
                    is_virtual: false,
                })
            })
            .collect();
        if complete.is_empty() {
            return complete;
        }

        let claimed: HashSet<&PathBuf> = complete.iter().flat_map(|c| c.primary.iter()).collect();
        let extras: Vec<PathBuf> = files
            .iter()
            .filter(|f| !claimed.contains(f) && !is_nested_archive_candidate(f))
            .cloned()
            .collect();

        for extra in extras {
            let name = extra
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            // Longest matching base wins so `skin_hd` extras do not land on `skin`.
            let owner = complete
                .iter()
                .enumerate()
                .filter(|(_, c)| name.starts_with(&c.base_name.to_lowercase()))
                .max_by_key(|(_, c)| c.base_name.len())
                .map(|(i, _)| i)
                .unwrap_or(0);
            complete[owner].auxiliary.push(extra);
        }
        complete
    }

    /// One candidate that stands for a whole archive with no recognizable payload.
    ///
    /// Everything extracted under `extracted_root` becomes auxiliary payload with its
    /// relative layout kept. If nothing was extracted, the raw archive itself is used.
    pub fn synthesize_virtual(&self, archive: &Path, extracted_root: &Path) -> VaultResult<ModCandidate> {
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "archive".to_string());

        let mut files = if extracted_root.is_dir() {
            list_files(extracted_root)?
        } else {
            Vec::new()
        };
        let root = if files.is_empty() {
            files.push(archive.to_path_buf());
            archive.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            extracted_root.to_path_buf()
        };

        log::info!(
            "No payload group in {}; importing it as virtual MOD '{stem}'",
            archive.display()
        );
        Ok(ModCandidate {
            id: safe_dir_name(&stem),
            base_name: stem,
            dir: root.clone(),
            root,
            primary: Vec::new(),
            auxiliary: files,
            source_archive: Some(archive.to_path_buf()),
            parent_archive: None,
            is_nested: false,
            is_virtual: true,
        })
    }
}

/// Unique, filesystem-safe ids. A base name shared by groups in different directories
/// is prefixed with the parent directory name; anything still colliding gets a number.
fn assign_ids(root: &Path, candidates: &mut [ModCandidate]) {
    let mut base_counts: HashMap<String, usize> = HashMap::new();
    for c in candidates.iter() {
        *base_counts.entry(c.base_name.to_lowercase()).or_default() += 1;
    }

    let mut used: HashSet<String> = HashSet::new();
    for c in candidates.iter_mut() {
        let shared = base_counts
            .get(&c.base_name.to_lowercase())
            .is_some_and(|n| *n > 1);
        let raw = if shared {
            let parent = if c.dir == root {
                "root".to_string()
            } else {
                c.dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "root".to_string())
            };
            format!("{parent}_{}", c.base_name)
        } else {
            c.base_name.clone()
        };

        let base_id = safe_dir_name(&raw);
        let mut id = base_id.clone();
        let mut n = 2;
        while !used.insert(id.to_lowercase()) {
            id = format!("{base_id}_{n}");
            n += 1;
        }
        c.id = id;
    }
}

#[cfg(test)]
#[path = "tests/detector_tests.rs"]
mod tests;
