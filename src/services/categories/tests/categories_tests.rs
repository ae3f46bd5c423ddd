use super::*;
use crate::services::config::JsonConfigStore;
use crate::types::DEFAULT_CATEGORY_NAME;
use tempfile::TempDir;

struct Fixture {
    _tmp: TempDir,
    config: Arc<JsonConfigStore>,
    registry: CategoryRegistry,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let config = Arc::new(JsonConfigStore::new(tmp.path().join("config.json")));
    let registry = CategoryRegistry::new(config.clone());
    Fixture {
        _tmp: tmp,
        config,
        registry,
    }
}

fn add_mod(config: &JsonConfigStore, id: &str, category: &str) {
    config.add_mod(ModRecord::new(id, category)).unwrap();
}

fn names(registry: &CategoryRegistry) -> Vec<String> {
    registry.get().into_iter().map(|c| c.name).collect()
}

#[test]
fn test_get_orders_by_creation_with_default_first() {
    let fx = fixture();
    fx.registry.add("Skins").unwrap();
    fx.registry.add("Maps").unwrap();
    fx.registry.add("Skins/Red").unwrap();

    assert_eq!(
        names(&fx.registry),
        vec![DEFAULT_CATEGORY_NAME, "Skins", "Maps", "Skins/Red"]
    );
    let cats = fx.registry.get();
    assert!(cats[0].is_default);
    assert!(cats.windows(2).skip(1).all(|w| w[0].created_at < w[1].created_at));
}

#[test]
fn test_default_sorts_first_even_with_stale_timestamp() {
    let fx = fixture();
    fx.config
        .set_categories(vec![
            Category {
                name: "Early".into(),
                created_at: -5,
                is_default: false,
            },
            Category {
                name: "Home".into(),
                created_at: 1_000,
                is_default: true,
            },
        ])
        .unwrap();

    assert_eq!(names(&fx.registry), vec!["Home", "Early"]);
    assert_eq!(fx.registry.default_name(), "Home");
}

#[test]
fn test_missing_default_is_recreated() {
    let fx = fixture();
    fx.config.set_categories(Vec::new()).unwrap();
    assert_eq!(names(&fx.registry), vec![DEFAULT_CATEGORY_NAME]);
}

#[test]
fn test_add_rejects_duplicates_and_bad_paths() {
    let fx = fixture();
    fx.registry.add("Skins").unwrap();

    assert!(matches!(fx.registry.add("Skins"), Err(VaultError::InvalidInput(_))));
    assert!(matches!(fx.registry.add("  "), Err(VaultError::InvalidInput(_))));
    assert!(matches!(fx.registry.add("a//b"), Err(VaultError::InvalidInput(_))));
    assert!(matches!(fx.registry.add("Skins/Red/Dark"), Err(VaultError::InvalidInput(_))));
    assert!(matches!(fx.registry.add("Ghost/Child"), Err(VaultError::NotFound(_))));
}

#[test]
fn test_ensure_creates_parent_and_child() {
    let fx = fixture();
    assert_eq!(fx.registry.ensure("Packs/Bundles").unwrap(), "Packs/Bundles");
    assert_eq!(fx.registry.ensure("").unwrap(), DEFAULT_CATEGORY_NAME);
    assert_eq!(fx.registry.ensure("Packs").unwrap(), "Packs");
    assert_eq!(
        names(&fx.registry),
        vec![DEFAULT_CATEGORY_NAME, "Packs", "Packs/Bundles"]
    );
}

#[test]
fn test_delete_moves_members_to_default() {
    let fx = fixture();
    fx.registry.add("Skins").unwrap();
    fx.registry.add("Skins/Red").unwrap();
    fx.registry.add("Maps").unwrap();
    add_mod(&fx.config, "a", "Skins");
    add_mod(&fx.config, "b", "Skins/Red");
    add_mod(&fx.config, "c", "Maps");

    fx.registry.delete("Skins").unwrap();

    assert_eq!(names(&fx.registry), vec![DEFAULT_CATEGORY_NAME, "Maps"]);
    let mods = fx.config.get_mods();
    assert_eq!(mods.len(), 3);
    assert_eq!(fx.config.get_mod("a").unwrap().category, DEFAULT_CATEGORY_NAME);
    assert_eq!(fx.config.get_mod("b").unwrap().category, DEFAULT_CATEGORY_NAME);
    assert_eq!(fx.config.get_mod("c").unwrap().category, "Maps");
}

/// Store whose category list cannot be written once `lock_categories` is set.
struct ReadOnlyCategories {
    inner: JsonConfigStore,
    locked: std::sync::atomic::AtomicBool,
}

impl ConfigStore for ReadOnlyCategories {
    fn get_mods(&self) -> Vec<ModRecord> {
        self.inner.get_mods()
    }
    fn add_mod(&self, record: ModRecord) -> VaultResult<()> {
        self.inner.add_mod(record)
    }
    fn update_mod(&self, record: &ModRecord) -> VaultResult<()> {
        self.inner.update_mod(record)
    }
    fn remove_mod(&self, id: &str) -> VaultResult<()> {
        self.inner.remove_mod(id)
    }
    fn get_categories(&self) -> Vec<Category> {
        self.inner.get_categories()
    }
    fn set_categories(&self, categories: Vec<Category>) -> VaultResult<()> {
        if self.locked.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(VaultError::Io("categories are read-only".to_string()));
        }
        self.inner.set_categories(categories)
    }
    fn get_backup_path(&self) -> Option<std::path::PathBuf> {
        None
    }
    fn get_active_mods_path(&self) -> Option<std::path::PathBuf> {
        None
    }
    fn data_dir(&self) -> std::path::PathBuf {
        self.inner.data_dir()
    }
}

#[test]
fn test_failed_delete_leaves_members_in_place() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(ReadOnlyCategories {
        inner: JsonConfigStore::new(tmp.path().join("config.json")),
        locked: std::sync::atomic::AtomicBool::new(false),
    });
    let registry = CategoryRegistry::new(store.clone());
    registry.add("Skins").unwrap();
    store.add_mod(ModRecord::new("a", "Skins")).unwrap();
    store.locked.store(true, std::sync::atomic::Ordering::SeqCst);

    assert!(matches!(registry.delete("Skins"), Err(VaultError::Io(_))));

    assert!(registry.exists("Skins"));
    assert_eq!(store.get_mod("a").unwrap().category, "Skins");
}

#[test]
fn test_delete_subcategory_only() {
    let fx = fixture();
    fx.registry.add("Skins").unwrap();
    fx.registry.add("Skins/Red").unwrap();
    add_mod(&fx.config, "a", "Skins/Red");

    fx.registry.delete("Skins/Red").unwrap();

    assert_eq!(names(&fx.registry), vec![DEFAULT_CATEGORY_NAME, "Skins"]);
    assert_eq!(fx.config.get_mod("a").unwrap().category, DEFAULT_CATEGORY_NAME);
}

#[test]
fn test_default_cannot_be_deleted() {
    let fx = fixture();
    assert!(matches!(
        fx.registry.delete(DEFAULT_CATEGORY_NAME),
        Err(VaultError::InvalidInput(_))
    ));
    assert!(matches!(fx.registry.delete("Nope"), Err(VaultError::NotFound(_))));
}

#[test]
fn test_rename_default_keeps_position_and_repoints() {
    let fx = fixture();
    fx.registry.add("Skins").unwrap();
    add_mod(&fx.config, "a", DEFAULT_CATEGORY_NAME);
    add_mod(&fx.config, "b", "Skins");

    let renamed = fx.registry.rename(DEFAULT_CATEGORY_NAME, "Unsorted").unwrap();

    assert!(renamed.is_default);
    let cats = fx.registry.get();
    assert_eq!(cats[0].name, "Unsorted");
    assert!(cats[0].is_default);
    assert_eq!(fx.registry.default_name(), "Unsorted");
    assert_eq!(fx.config.get_mod("a").unwrap().category, "Unsorted");
    assert_eq!(fx.config.get_mod("b").unwrap().category, "Skins");

    // Deleting a category after the rename lands members on the new default.
    fx.registry.delete("Skins").unwrap();
    assert_eq!(fx.config.get_mod("b").unwrap().category, "Unsorted");
}

#[test]
fn test_rename_parent_repoints_children_members() {
    let fx = fixture();
    fx.registry.add("Skins").unwrap();
    fx.registry.add("Skins/Red").unwrap();
    add_mod(&fx.config, "a", "Skins/Red");

    fx.registry.rename("Skins", "Outfits").unwrap();

    assert_eq!(
        names(&fx.registry),
        vec![DEFAULT_CATEGORY_NAME, "Outfits", "Outfits/Red"]
    );
    assert_eq!(fx.config.get_mod("a").unwrap().category, "Outfits/Red");
}

#[test]
fn test_rename_child_by_label_or_full_path() {
    let fx = fixture();
    fx.registry.add("Skins").unwrap();
    fx.registry.add("Skins/Red").unwrap();
    fx.registry.add("Maps").unwrap();

    fx.registry.rename("Skins/Red", "Crimson").unwrap();
    fx.registry.rename("Skins/Crimson", "Skins/Scarlet").unwrap();

    assert!(fx.registry.exists("Skins/Scarlet"));
    assert!(matches!(
        fx.registry.rename("Skins/Scarlet", "Maps/Scarlet"),
        Err(VaultError::InvalidInput(_))
    ));
    assert!(matches!(
        fx.registry.rename("Skins", "Maps"),
        Err(VaultError::InvalidInput(_))
    ));
}

#[test]
fn test_set_member_category() {
    let fx = fixture();
    fx.registry.add("Skins").unwrap();
    add_mod(&fx.config, "a", DEFAULT_CATEGORY_NAME);

    let record = fx.registry.set_member_category("a", "Skins").unwrap();
    assert_eq!(record.category, "Skins");
    assert_eq!(fx.config.get_mod("a").unwrap().category, "Skins");

    assert!(matches!(
        fx.registry.set_member_category("a", "Ghost"),
        Err(VaultError::NotFound(_))
    ));
    assert!(matches!(
        fx.registry.set_member_category("ghost", "Skins"),
        Err(VaultError::NotFound(_))
    ));
}
