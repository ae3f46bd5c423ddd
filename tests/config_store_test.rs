use modvault_lib::services::config::{AppSettings, ConfigStore, JsonConfigStore};
use modvault_lib::types::ModRecord;
use std::fs;
use tempfile::tempdir;

#[test]
fn save_settings_can_overwrite_existing_config_file() {
    let dir = tempdir().expect("temp dir should be created");
    let config_path = dir.path().join("config.json");
    let store = JsonConfigStore::new(config_path.clone());

    store
        .set_active_mods_path(dir.path().join("mods"))
        .expect("first save should create config file");
    store
        .set_backup_path(dir.path().join("backup"))
        .expect("second save should replace the config file");

    let saved_content = fs::read_to_string(&config_path).expect("config should exist");
    let saved: AppSettings =
        serde_json::from_str(&saved_content).expect("saved config should be valid JSON");
    assert_eq!(saved.backup_path, Some(dir.path().join("backup")));
    assert_eq!(saved.active_mods_path, Some(dir.path().join("mods")));
    assert!(saved.initialized);
    assert!(!dir.path().join("config.json.tmp").exists());
}

#[test]
fn records_round_trip_through_a_new_store() {
    let dir = tempdir().expect("temp dir should be created");
    let config_path = dir.path().join("data").join("config.json");
    {
        let store = JsonConfigStore::new(config_path.clone());
        let mut record = ModRecord::new("skin", "Default");
        record.files = vec!["skin/skin.pak".to_string()];
        record.enabled = true;
        store.add_mod(record).expect("record should persist");
        store.flush().expect("flush should succeed");
    }

    let reopened = JsonConfigStore::new(config_path);
    let record = reopened.get_mod("skin").expect("record should be reloaded");
    assert!(record.enabled);
    assert_eq!(record.files, vec!["skin/skin.pak"]);
    assert_eq!(reopened.data_dir(), dir.path().join("data"));
}

#[test]
fn malformed_config_falls_back_to_defaults() {
    let dir = tempdir().expect("temp dir should be created");
    let config_path = dir.path().join("config.json");
    fs::write(&config_path, "{ not json").expect("write should succeed");

    let store = JsonConfigStore::new(config_path);

    assert!(store.get_mods().is_empty());
    assert!(store.get_active_mods_path().is_none());
    let categories = store.get_categories();
    assert_eq!(categories.len(), 1);
    assert!(categories[0].is_default);
}
