use crate::services::archive::{BackendRegistry, RarLibrary, SevenZLibrary, ZipLibrary};
use crate::services::config::JsonConfigStore;
use crate::services::mods::ModLifecycleManager;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub struct TestContext {
    pub root: TempDir,
    pub active: PathBuf,
    pub backup: PathBuf,
    pub config: Arc<JsonConfigStore>,
}

/// Fresh config, active directory and backup root inside one temp dir.
pub fn init_test_env() -> TestContext {
    init_logging();

    let root = TempDir::new().expect("Failed to create temp dir");
    let active = root.path().join("game").join("~mods");
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

/// Library backends only, so results never depend on tools installed on the host.
pub fn library_registry() -> BackendRegistry {
    BackendRegistry::from_strategies(vec![
        Arc::new(ZipLibrary),
        Arc::new(SevenZLibrary),
        Arc::new(RarLibrary),
    ])
}

impl TestContext {
    pub fn manager(&self) -> ModLifecycleManager {
        ModLifecycleManager::new(self.config.clone(), library_registry())
    }

    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.root.path().join("downloads").join(name)
    }
}

/// Contents for a `<base>.pak/.ucas/.utoc` triple. Sizes differ per extension.
pub fn triple_entries(prefix: &str, base: &str) -> Vec<(String, Vec<u8>)> {
    ["pak", "ucas", "utoc"]
        .iter()
        .enumerate()
        .map(|(i, ext)| {
            let name = format!("{prefix}{base}.{ext}");
            let body = format!("{base}-{ext}-").repeat(i + 2).into_bytes();
            (name, body)
        })
        .collect()
}

pub fn write_triple(dir: &Path, base: &str) -> Vec<PathBuf> {
    fs::create_dir_all(dir).expect("Failed to create triple dir");
    triple_entries("", base)
        .into_iter()
        .map(|(name, body)| {
            let path = dir.join(name);
            fs::write(&path, body).expect("Failed to write payload file");
            path
        })
        .collect()
}

pub fn create_zip<N: AsRef<str>, B: AsRef<[u8]>>(path: &Path, entries: &[(N, B)]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create zip parent");
    }
    let file = fs::File::create(path).expect("Failed to create zip");
    let mut writer = zip::ZipWriter::new(file);
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, content) in entries {
        writer
            .start_file(name.as_ref().to_string(), options)
            .expect("Failed to start zip entry");
        writer
            .write_all(content.as_ref())
            .expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip");
    path.to_path_buf()
}

/// Zips an archive that holds nothing but the given archive file.
pub fn wrap_in_zip(path: &Path, inner: &Path) -> PathBuf {
    let name = inner
        .file_name()
        .expect("inner archive has a name")
        .to_string_lossy()
        .to_string();
    let bytes = fs::read(inner).expect("Failed to read inner archive");
    create_zip(path, &[(name, bytes)])
}
