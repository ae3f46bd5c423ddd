use crate::types::{VaultError, VaultResult};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Moves `src` to `dest`, creating parent directories and replacing an existing file.
/// Returns the size of the moved file.
///
/// A plain rename is tried first. When that fails (scratch space and the active
/// directory can sit on different volumes) the file is copied and the source removed.
pub fn move_file(src: &Path, dest: &Path) -> VaultResult<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| VaultError::io_at("create dir", parent, e))?;
    }
    let size = fs::metadata(src)
        .map_err(|e| VaultError::io_at("stat", src, e))?
        .len();

    if let Err(e) = fs::rename(src, dest) {
        log::debug!("rename {} failed ({e}); copying instead", src.display());
        let mut options = fs_extra::file::CopyOptions::new();
        options.overwrite = true;
        fs_extra::file::move_file(src, dest, &options)
            .map_err(|e| VaultError::Io(format!("move '{}': {e}", src.display())))?;
    }
    Ok(size)
}

/// Copies `src` to `dest`, creating parent directories and overwriting an existing file.
pub fn copy_file_overwrite(src: &Path, dest: &Path) -> VaultResult<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| VaultError::io_at("create dir", parent, e))?;
    }
    fs::copy(src, dest).map_err(|e| VaultError::io_at("copy", src, e))
}

/// Returns `dir/name`, or `dir/name_2`, `dir/name_3`... if that already exists.
pub fn unique_child(dir: &Path, name: &str) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }
    let mut n = 2;
    loop {
        let candidate = dir.join(format!("{name}_{n}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// All regular files under `root`, sorted for deterministic processing.
pub fn list_files(root: &Path) -> VaultResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// `path` relative to `root`, `/` separated. `None` when `path` is not under `root`.
pub fn relative_slash(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Removes empty directories from `start` upwards, stopping at (and never removing) `stop_at`.
pub fn prune_empty_dirs(start: &Path, stop_at: &Path) {
    let mut current = Some(start.to_path_buf());
    while let Some(dir) = current {
        if dir == stop_at || !dir.starts_with(stop_at) {
            break;
        }
        let is_empty = fs::read_dir(&dir)
            .map(|mut it| it.next().is_none())
            .unwrap_or(false);
        if !is_empty || fs::remove_dir(&dir).is_err() {
            break;
        }
        log::debug!("Removed empty directory {}", dir.display());
        current = dir.parent().map(Path::to_path_buf);
    }
}

/// Streaming BLAKE3 of a file's contents.
pub fn hash_file(path: &Path) -> VaultResult<String> {
    let file = File::open(path).map_err(|e| VaultError::io_at("open", path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| VaultError::io_at("hash", path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
