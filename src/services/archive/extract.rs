use super::analyze::{analyze_archive, ensure_disk_space};
use super::capabilities::BackendRegistry;
use super::types::{
    is_nested_archive_candidate, ArchiveFormat, BackendKind, ExtractionReport, NestedArchive,
    MAX_NESTING_DEPTH,
};
use crate::services::fs_utils::file_utils::{hash_file, list_files, unique_child};
use crate::types::{VaultError, VaultResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Recursively unwraps an archive into a plain directory tree.
///
/// Writes only under the destination it is given. Per-archive failures never abort the
/// call; they are counted in the returned [`ExtractionReport`].
pub struct ArchiveExtractor {
    registry: BackendRegistry,
}

/// Per-call traversal state.
struct Walk {
    visited: HashSet<PathBuf>,
    /// Content hashes of the archives currently being unwrapped, outermost first.
    ancestry: Vec<String>,
    report: ExtractionReport,
}

impl ArchiveExtractor {
    pub fn new(registry: BackendRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Extract `archive` into `dest`, then keep unwrapping any archives found inside.
    /// `dest` is expected to be an empty scratch directory.
    ///
    /// Hard errors are limited to a missing source, an uncreatable destination and a
    /// destination volume that clearly lacks space.
    pub fn extract(&self, archive: &Path, dest: &Path) -> VaultResult<ExtractionReport> {
        if !archive.is_file() {
            return Err(VaultError::NotFound(format!(
                "Archive {}",
                archive.display()
            )));
        }
        fs::create_dir_all(dest).map_err(|e| VaultError::io_at("create", dest, e))?;

        match analyze_archive(archive) {
            Ok(analysis) => ensure_disk_space(dest, analysis.uncompressed_size)?,
            Err(e) => log::debug!("Skipping pre-extraction analysis: {e}"),
        }

        let mut walk = Walk {
            visited: HashSet::new(),
            ancestry: Vec::new(),
            report: ExtractionReport::default(),
        };
        self.unwrap(archive, dest, 0, &mut walk)?;

        let report = walk.report;
        log::info!(
            "Extracted {}: {} decoded, {} raw, {} nested, {} backend failures",
            archive.display(),
            report.decoded,
            report.raw_copied,
            report.nested.len(),
            report.backend_failures
        );
        Ok(report)
    }

    fn unwrap(&self, archive: &Path, dest: &Path, depth: usize, walk: &mut Walk) -> VaultResult<()> {
        walk.report.archives_seen += 1;
        let archive_name = file_name_of(archive);

        let canonical = archive.canonicalize().unwrap_or_else(|_| archive.to_path_buf());
        if !walk.visited.insert(canonical) {
            walk.report.cycles_skipped += 1;
            walk.report
                .warn(format!("Archive '{archive_name}' was already unwrapped; skipping"));
            return Ok(());
        }

        let hash = match hash_file(archive) {
            Ok(h) => Some(h),
            Err(e) => {
                log::warn!("Could not hash {}: {e}", archive.display());
                None
            }
        };
        if depth == 0 {
            walk.report.source_hash = hash.clone();
        }
        if let Some(h) = &hash {
            if walk.ancestry.contains(h) {
                walk.report.cycles_skipped += 1;
                walk.report.warn(format!(
                    "Archive '{archive_name}' contains a copy of itself; left undecoded"
                ));
                return Ok(());
            }
        }

        if !self.decode(archive, dest, depth, walk)? {
            return Ok(());
        }
        walk.report.decoded += 1;

        if depth > 0 {
            if let Err(e) = fs::remove_file(archive) {
                log::warn!("Failed to remove decoded archive {}: {e}", archive.display());
            }
            walk.report.nested.push(NestedArchive {
                archive_name,
                extracted_to: dest.to_path_buf(),
                depth,
            });
        }

        let children: Vec<PathBuf> = list_files(dest)?
            .into_iter()
            .filter(|p| is_nested_archive_candidate(p))
            .collect();
        if children.is_empty() {
            return Ok(());
        }

        let child_depth = depth + 1;
        if let Some(h) = hash.clone() {
            walk.ancestry.push(h);
        }
        for child in children {
            if child_depth > MAX_NESTING_DEPTH {
                walk.report.depth_limited += 1;
                walk.report.warn(format!(
                    "Nested archive '{}' exceeds depth {MAX_NESTING_DEPTH}; left undecoded",
                    file_name_of(&child)
                ));
                continue;
            }
            let parent = child.parent().unwrap_or(dest);
            let stem = child
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "nested".to_string());
            let out = unique_child(parent, &stem);
            self.unwrap(&child, &out, child_depth, walk)?;
        }
        if hash.is_some() {
            walk.ancestry.pop();
        }
        Ok(())
    }

    /// Tries each backend for the detected format in order.
    /// Returns `true` when the archive was decoded, `false` when it was kept as a raw file.
    fn decode(&self, archive: &Path, dest: &Path, depth: usize, walk: &mut Walk) -> VaultResult<bool> {
        let archive_name = file_name_of(archive);
        let format = match ArchiveFormat::detect(archive) {
            Some(format) => format,
            None => {
                walk.report.warn(format!(
                    "'{archive_name}' is not a recognized archive format"
                ));
                return self.keep_raw(archive, dest, depth, walk);
            }
        };

        for strategy in self.registry.strategies_for(format) {
            if strategy.kind() == BackendKind::RawCopy {
                break;
            }
            fs::create_dir_all(dest).map_err(|e| VaultError::io_at("create", dest, e))?;
            match strategy.extract(archive, dest) {
                Ok(count) => {
                    log::debug!(
                        "{} decoded '{archive_name}' ({count} files, depth {depth})",
                        strategy.name()
                    );
                    return Ok(true);
                }
                Err(e) => {
                    walk.report.backend_failures += 1;
                    log::warn!("{e}");
                    clear_dir(dest);
                }
            }
        }

        walk.report.warn(format!(
            "No backend could decode '{archive_name}' ({})",
            format.label()
        ));
        self.keep_raw(archive, dest, depth, walk)
    }

    /// The top-level archive is copied into `dest` with the raw-copy backend. A nested
    /// archive already sits inside the tree, so it stays where it is.
    fn keep_raw(&self, archive: &Path, dest: &Path, depth: usize, walk: &mut Walk) -> VaultResult<bool> {
        walk.report.raw_copied += 1;
        let archive_name = file_name_of(archive);

        if depth > 0 {
            if dest.exists() {
                let _ = fs::remove_dir_all(dest);
            }
            walk.report
                .warn(format!("Kept '{archive_name}' as an undecoded file"));
            return Ok(false);
        }

        self.registry.fallback().extract(archive, dest)?;
        walk.report
            .warn(format!("Copied '{archive_name}' without decoding it"));
        Ok(false)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Removes partial output left by a failed backend.
fn clear_dir(dir: &Path) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(e) = result {
            log::warn!("Failed to clean {}: {e}", path.display());
        }
    }
}
