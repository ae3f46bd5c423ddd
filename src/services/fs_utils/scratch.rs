//! Tracked scratch space for archive extraction.
//!
//! Every scratch directory lives under `<data_dir>/.scratch` and is registered while
//! alive. Dropping the handle deletes the directory, so every exit path of an import
//! (including `?` returns and unwinding) cleans up. Directory names start with
//! `p<pid>-`, the owning process. [`ScratchRegistry::sweep_leftovers`] runs at startup and
//! removes only what a process that is no longer running left behind.

use crate::types::{VaultError, VaultResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tempfile::TempDir;

pub const SCRATCH_DIR_NAME: &str = ".scratch";

#[derive(Clone)]
pub struct ScratchRegistry {
    root: PathBuf,
    live: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ScratchRegistry {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.join(SCRATCH_DIR_NAME),
            live: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create(&self, label: &str) -> VaultResult<ScratchDir> {
        fs::create_dir_all(&self.root)
            .map_err(|e| VaultError::io_at("create scratch root", &self.root, e))?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("p{}-{label}-", std::process::id()))
            .tempdir_in(&self.root)
            .map_err(|e| VaultError::io_at("create scratch dir", &self.root, e))?;
        let path = dir.path().to_path_buf();
        lock_set(&self.live).insert(path.clone());
        log::debug!("Scratch dir created: {}", path.display());
        Ok(ScratchDir {
            dir: Some(dir),
            path,
            live: Arc::clone(&self.live),
        })
    }

    pub fn live_count(&self) -> usize {
        lock_set(&self.live).len()
    }

    /// Removes scratch entries whose owning process has exited. Entries of this
    /// registry and of other running processes are kept; entries without an owner
    /// prefix are removed. Returns the number of entries removed.
    pub fn sweep_leftovers(&self) -> usize {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let live = lock_set(&self.live).clone();
        let mut system = System::new();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if live.contains(&path) {
                continue;
            }
            let owner = entry.file_name().to_str().and_then(owner_pid);
            if let Some(pid) = owner {
                if is_running(&mut system, pid) {
                    log::debug!("Keeping scratch {} of running process {pid}", path.display());
                    continue;
                }
            }
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(_) => removed += 1,
                Err(e) => log::warn!("Failed to sweep scratch {}: {e}", path.display()),
            }
        }
        if removed > 0 {
            log::info!("Swept {removed} leftover scratch entries");
        }
        removed
    }
}

/// A scratch directory that deletes itself on drop.
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
    live: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                log::warn!("Failed to remove scratch {}: {e}", self.path.display());
            }
        }
        lock_set(&self.live).remove(&self.path);
    }
}

/// Pid encoded in a `p<pid>-...` scratch entry name.
fn owner_pid(name: &str) -> Option<u32> {
    let (head, _) = name.strip_prefix('p')?.split_once('-')?;
    head.parse().ok()
}

fn is_running(system: &mut System, pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    let pid = Pid::from_u32(pid);
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}

fn lock_set(set: &Mutex<HashSet<PathBuf>>) -> MutexGuard<'_, HashSet<PathBuf>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
