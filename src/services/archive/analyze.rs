use super::types::{ArchiveAnalysis, ArchiveFormat};
use crate::types::{VaultError, VaultResult};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Extra headroom required on top of the uncompressed size.
const DISK_SPACE_MARGIN: u64 = 50 * 1024 * 1024;

/// Analyze a zip or 7z archive without extracting it.
///
/// RAR listings need a full decode with the library backend, so RAR is reported as
/// unsupported here and callers skip the pre-checks that depend on it.
pub fn analyze_archive(archive_path: &Path) -> VaultResult<ArchiveAnalysis> {
    let format = ArchiveFormat::detect(archive_path).ok_or_else(|| {
        VaultError::ArchiveUnsupportedOrCorrupt(format!(
            "Unknown archive format: {}",
            archive_path.display()
        ))
    })?;

    match format {
        ArchiveFormat::Zip => analyze_zip(archive_path),
        ArchiveFormat::SevenZ => analyze_7z(archive_path),
        ArchiveFormat::Rar => Err(VaultError::ArchiveUnsupportedOrCorrupt(format!(
            "RAR listing is not available without extraction: {}",
            archive_path.display()
        ))),
    }
}

fn analyze_zip(archive_path: &Path) -> VaultResult<ArchiveAnalysis> {
    let file = fs::File::open(archive_path).map_err(|e| VaultError::io_at("open", archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| VaultError::ArchiveUnsupportedOrCorrupt(format!("Failed to read ZIP: {e}")))?;

    let mut file_count = 0;
    let mut uncompressed_size: u64 = 0;
    let mut roots = HashSet::new();

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(|e| {
            VaultError::ArchiveUnsupportedOrCorrupt(format!("Failed to read entry {i}: {e}"))
        })?;
        if !entry.is_dir() {
            file_count += 1;
        }
        uncompressed_size += entry.size();
        note_root(&mut roots, entry.name());
    }

    Ok(ArchiveAnalysis {
        format: ArchiveFormat::Zip,
        file_count,
        uncompressed_size,
        single_root_folder: single_root(roots),
    })
}

fn analyze_7z(archive_path: &Path) -> VaultResult<ArchiveAnalysis> {
    let mut file_count = 0;
    let mut uncompressed_size: u64 = 0;
    let mut roots = HashSet::new();

    let file = fs::File::open(archive_path).map_err(|e| VaultError::io_at("open", archive_path, e))?;
    sevenz_rust::decompress_with_extract_fn(file, ".", |entry, _, _| {
        if !entry.is_directory() {
            file_count += 1;
        }
        uncompressed_size += entry.size();
        note_root(&mut roots, entry.name());
        // Listing only; nothing is written.
        Ok(true)
    })
    .map_err(|e| VaultError::ArchiveUnsupportedOrCorrupt(format!("Failed to analyze 7z: {e}")))?;

    Ok(ArchiveAnalysis {
        format: ArchiveFormat::SevenZ,
        file_count,
        uncompressed_size,
        single_root_folder: single_root(roots),
    })
}

fn note_root(roots: &mut HashSet<String>, entry_name: &str) {
    let normalized = entry_name.replace('\\', "/");
    if let Some(first) = normalized.split('/').next() {
        if !first.is_empty() {
            roots.insert(first.to_string());
        }
    }
}

fn single_root(roots: HashSet<String>) -> Option<String> {
    if roots.len() == 1 {
        roots.into_iter().next()
    } else {
        None
    }
}

/// Refuses when the volume holding `dest` clearly cannot fit `uncompressed_size`.
/// Unknown volumes pass.
pub fn ensure_disk_space(dest: &Path, uncompressed_size: u64) -> VaultResult<()> {
    let required = uncompressed_size + DISK_SPACE_MARGIN;
    let search_path = dest.canonicalize().unwrap_or_else(|_| dest.to_path_buf());

    let disks = sysinfo::Disks::new_with_refreshed_list();
    let mut available = 0;
    let mut matched_len = 0;
    for disk in disks.list() {
        let mount = disk.mount_point();
        if search_path.starts_with(mount) {
            let mount_len = mount.as_os_str().len();
            if mount_len > matched_len {
                matched_len = mount_len;
                available = disk.available_space();
            }
        }
    }

    if matched_len > 0 && available < required {
        return Err(VaultError::Io(format!(
            "Insufficient disk space at {}. Requires {required} bytes, only {available} bytes available.",
            dest.display()
        )));
    }
    Ok(())
}
