#![allow(dead_code)]

use modvault_lib::services::archive::{
    BackendRegistry, RarLibrary, SevenZLibrary, ZipLibrary,
};
use modvault_lib::services::config::JsonConfigStore;
use modvault_lib::services::mods::ModLifecycleManager;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;

static INIT: Once = Once::new();

pub struct TestContext {
    pub root: TempDir,
    pub active: PathBuf,
    pub backup: PathBuf,
    pub config: Arc<JsonConfigStore>,
}

impl TestContext {
    pub fn manager(&self) -> ModLifecycleManager {
        let registry = BackendRegistry::from_strategies(vec![
            Arc::new(ZipLibrary),
            Arc::new(SevenZLibrary),
            Arc::new(RarLibrary),
        ]);
        ModLifecycleManager::new(self.config.clone(), registry)
    }

    pub fn download(&self, name: &str) -> PathBuf {
        self.root.path().join("downloads").join(name)
    }

    /// Reopens the store from disk, as a restarted process would.
    pub fn reopen_config(&self) -> JsonConfigStore {
        JsonConfigStore::new(self.config.config_path().to_path_buf())
    }
}

/// Bytes of the checked-in RAR5 store archive holding a `neon` triple.
pub fn rar_fixture() -> Vec<u8> {
    fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/neon_store.rar"))
        .expect("Failed to read RAR fixture")
}

pub fn init_test_env() -> TestContext {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });

    let root = TempDir::new().expect("Failed to create temp dir");
    let active = root.path().join("game").join("Content").join("Paks").join("~mods");
    let backup = root.path().join("backup");
    fs::create_dir_all(&active).expect("Failed to create active dir");

    let config = Arc::new(JsonConfigStore::new(root.path().join("data").join("config.json")));
    config
        .set_active_mods_path(&active)
        .expect("Failed to set active path");
    config
        .set_backup_path(&backup)
        .expect("Failed to set backup path");

    TestContext {
        root,
        active,
        backup,
        config,
    }
}

/// `<prefix><base>.pak/.ucas/.utoc` entries with distinct sizes.
pub fn triple(prefix: &str, base: &str) -> Vec<(String, Vec<u8>)> {
    ["pak", "ucas", "utoc"]
        .iter()
        .enumerate()
        .map(|(i, ext)| {
            (
                format!("{prefix}{base}.{ext}"),
                format!("{base}:{ext};").repeat(i + 3).into_bytes(),
            )
        })
        .collect()
}

pub fn zip_archive(path: &Path, entries: &[(String, Vec<u8>)]) -> PathBuf {
    fs::create_dir_all(path.parent().expect("zip has a parent")).expect("Failed to create dir");
    let mut writer = zip::ZipWriter::new(fs::File::create(path).expect("Failed to create zip"));
    let options = zip::write::SimpleFileOptions::default();
    for (name, body) in entries {
        writer
            .start_file(name.as_str(), options)
            .expect("Failed to start zip entry");
        writer.write_all(body).expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip");
    path.to_path_buf()
}

/// Builds a 7z archive from the given entries via a staging directory.
pub fn sevenz_archive(path: &Path, entries: &[(String, Vec<u8>)]) -> PathBuf {
    let staging = path.with_extension("staging");
    for (name, body) in entries {
        let file = staging.join(name);
        fs::create_dir_all(file.parent().expect("entry has a parent")).expect("Failed to stage");
        fs::write(&file, body).expect("Failed to stage entry");
    }
    sevenz_rust::compress_to_path(&staging, path).expect("Failed to build 7z");
    fs::remove_dir_all(&staging).expect("Failed to remove staging dir");
    path.to_path_buf()
}

/// `(relative path, size)` of every file under `dir`, sorted by path.
pub fn tree_listing(dir: &Path) -> Vec<(String, u64)> {
    let mut out: Vec<(String, u64)> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(dir)
                .expect("entry under dir")
                .to_string_lossy()
                .replace('\\', "/");
            (rel, e.metadata().expect("metadata").len())
        })
        .collect();
    out.sort();
    out
}

pub fn tree_contents(dir: &Path) -> Vec<(String, Vec<u8>)> {
    tree_listing(dir)
        .into_iter()
        .map(|(rel, _)| {
            let body = fs::read(dir.join(&rel)).expect("readable");
            (rel, body)
        })
        .collect()
}
