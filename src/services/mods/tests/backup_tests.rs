use super::*;
use crate::test_utils::write_triple;
use std::fs;
use tempfile::TempDir;

struct Fixture {
    _tmp: TempDir,
    store: BackupStore,
    src: PathBuf,
    active: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let store = BackupStore::open(&tmp.path().join("backup")).unwrap();
    let src = tmp.path().join("src");
    let active = tmp.path().join("active");
    fs::create_dir_all(&active).unwrap();
    Fixture {
        store,
        src,
        active,
        _tmp: tmp,
    }
}

fn record_for(id: &str) -> ModRecord {
    let mut record = ModRecord::new(id, "Default");
    record.files = ["pak", "utoc", "ucas"]
        .iter()
        .map(|ext| format!("{id}/{id}.{ext}"))
        .collect();
    record
}

#[test]
fn test_add_flattens_files_and_stores_preview() {
    let fx = fixture();
    let mut files = write_triple(&fx.src.join("deep/nested"), "skin");
    fs::write(fx.src.join("readme.txt"), b"r").unwrap();
    files.push(fx.src.join("readme.txt"));
    let image = fx.src.join("shot.PNG");
    fs::write(&image, b"img").unwrap();

    let report = fx.store.add("skin", &files, Some(&image)).unwrap();

    assert_eq!(report.copied, 4);
    assert_eq!(report.failed, 0);
    let entry = fx.store.root().join("skin");
    assert!(entry.join("skin.pak").is_file());
    assert!(entry.join("readme.txt").is_file());
    assert_eq!(fs::read(entry.join(".preview.png")).unwrap(), b"img");
    assert_eq!(fx.store.payload_files("skin").unwrap().len(), 4);
    assert_eq!(fx.store.preview_path("skin"), Some(entry.join(".preview.png")));
    assert!(entry.join(MANIFEST_NAME).is_file());
}

#[test]
fn test_add_replaces_previous_entry() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    fx.store.add("skin", &files, None).unwrap();
    fs::write(fx.store.root().join("skin/stale.bin"), b"old").unwrap();

    fx.store.add("skin", &files[..1], None).unwrap();

    assert_eq!(fx.store.payload_files("skin").unwrap().len(), 1);
    assert!(!fx.store.root().join("skin/stale.bin").exists());
}

#[test]
fn test_add_keeps_preview_that_lives_in_the_entry() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    let image = fx.src.join("shot.jpg");
    fs::write(&image, b"jpg").unwrap();
    fx.store.add("skin", &files, Some(&image)).unwrap();
    let stored = fx.store.preview_path("skin").unwrap();

    fx.store.add("skin", &files, Some(&stored)).unwrap();

    assert_eq!(fs::read(fx.store.root().join("skin/.preview.jpg")).unwrap(), b"jpg");
}

#[test]
fn test_add_with_nothing_copyable_leaves_no_entry() {
    let fx = fixture();
    let ghost = vec![fx.src.join("missing.pak")];

    let result = fx.store.add("ghost", &ghost, None);

    assert!(matches!(result, Err(VaultError::BackupMissingOrEmpty(_))));
    assert!(!fx.store.exists("ghost"));
}

#[test]
fn test_same_named_files_are_stored_apart_and_restored_in_place() {
    let fx = fixture();
    let a = fx.src.join("a/config.ini");
    let b = fx.src.join("b/config.ini");
    fs::create_dir_all(a.parent().unwrap()).unwrap();
    fs::create_dir_all(b.parent().unwrap()).unwrap();
    fs::write(&a, b"aaaa").unwrap();
    fs::write(&b, b"bbbbbbbb").unwrap();

    let report = fx.store.add("cfg", &[a, b], None).unwrap();

    assert_eq!(report.copied, 2);
    assert_eq!(report.failed, 0);
    assert!(fx.store.root().join("cfg/config.ini").is_file());
    assert!(fx.store.root().join("cfg/config~2.ini").is_file());

    let mut record = ModRecord::new("cfg", "Default");
    record.files = vec!["cfg/a/config.ini".into(), "cfg/b/config.ini".into()];
    let restored = fx.store.restore(&record, &fx.active).unwrap();

    assert_eq!(restored.copied, 2);
    assert_eq!(fs::read(fx.active.join("cfg/a/config.ini")).unwrap(), b"aaaa");
    assert_eq!(fs::read(fx.active.join("cfg/b/config.ini")).unwrap(), b"bbbbbbbb");
    assert!(!fx.active.join("cfg/config~2.ini").exists());
}

#[test]
fn test_payload_named_like_a_preview_is_not_shadowed() {
    let fx = fixture();
    let mut files = write_triple(&fx.src, "skin");
    for name in ["preview.png", ".preview.png"] {
        fs::write(fx.src.join(name), name.as_bytes()).unwrap();
        files.push(fx.src.join(name));
    }
    let image = fx.src.join("cover.png");
    fs::write(&image, b"cover").unwrap();

    fx.store.add("skin", &files, Some(&image)).unwrap();
    fx.store.set_preview("skin", &image).unwrap();

    assert_eq!(fx.store.payload_files("skin").unwrap().len(), 5);
    let mut record = record_for("skin");
    record.files.push("skin/preview.png".into());
    record.files.push("skin/.preview.png".into());
    let restored = fx.store.restore(&record, &fx.active).unwrap();

    assert_eq!(restored.copied, 5);
    assert_eq!(fs::read(fx.active.join("skin/preview.png")).unwrap(), b"preview.png");
    assert_eq!(fs::read(fx.active.join("skin/.preview.png")).unwrap(), b".preview.png");
    assert_eq!(
        fs::read(fx.store.preview_path("skin").unwrap()).unwrap(),
        b"cover"
    );
}

#[test]
fn test_entry_without_manifest_restores_by_stored_name() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    fx.store.add("skin", &files, None).unwrap();
    fs::remove_file(fx.store.root().join("skin").join(MANIFEST_NAME)).unwrap();

    let report = fx.store.restore(&record_for("skin"), &fx.active).unwrap();

    assert_eq!(report.copied, 3);
    assert!(fx.active.join("skin/skin.utoc").is_file());
}

#[test]
fn test_restore_into_mod_folder() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    fx.store.add("skin", &files, None).unwrap();

    let report = fx.store.restore(&record_for("skin"), &fx.active).unwrap();

    assert_eq!(report.entry, "skin");
    assert_eq!(report.copied, 3);
    assert_eq!(
        fs::read(fx.active.join("skin/skin.pak")).unwrap(),
        fs::read(&files[0]).unwrap()
    );
    assert!(report.files.contains(&"skin/skin.ucas".to_string()));
}

#[test]
fn test_restore_keeps_recorded_layout() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    fx.store.add("odd", &files, None).unwrap();
    let mut record = ModRecord::new("odd", "Default");
    record.files = vec!["odd/sub/skin.pak".into()];

    let report = fx.store.restore(&record, &fx.active).unwrap();

    assert!(fx.active.join("odd/sub/skin.pak").is_file());
    assert!(fx.active.join("odd/skin.utoc").is_file());
    assert_eq!(report.files.len(), 3);
}

#[test]
fn test_restore_falls_back_to_real_name_before_display_name() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    fx.store.add("skin_v1", &files, None).unwrap();
    fx.store.add("My Skin", &files[..1], None).unwrap();

    let mut record = record_for("skin");
    record.real_name = "skin_v1".into();
    record.name = "My Skin".into();

    let report = fx.store.restore(&record, &fx.active).unwrap();
    assert_eq!(report.entry, "skin_v1");
    assert_eq!(report.copied, 3);
}

#[test]
fn test_restore_without_entry_fails_cleanly() {
    let fx = fixture();

    let result = fx.store.restore(&record_for("skin"), &fx.active);

    assert!(matches!(result, Err(VaultError::BackupMissingOrEmpty(_))));
    assert!(!fx.active.join("skin").exists());
}

#[test]
fn test_restore_of_preview_only_entry_fails() {
    let fx = fixture();
    fs::create_dir_all(fx.store.root().join("skin")).unwrap();
    fs::write(fx.store.root().join("skin/.preview.png"), b"img").unwrap();

    let result = fx.store.restore(&record_for("skin"), &fx.active);
    assert!(matches!(result, Err(VaultError::BackupMissingOrEmpty(_))));
}

#[test]
fn test_restore_with_all_copies_failing_removes_created_folder() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    fx.store.add("skin", &files, None).unwrap();
    let mut record = record_for("skin");
    // Every target escapes the active directory, so nothing can be placed.
    record.files = vec![
        "../skin.pak".into(),
        "../skin.utoc".into(),
        "../skin.ucas".into(),
    ];

    let result = fx.store.restore(&record, &fx.active);

    assert!(matches!(
        result,
        Err(VaultError::PartialCopyFailure { copied: 0, failed: 3, .. })
    ));
    assert!(!fx.active.join("skin").exists());
}

#[test]
fn test_set_preview_replaces_existing() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    let png = fx.src.join("a.png");
    let webp = fx.src.join("b.webp");
    fs::write(&png, b"png").unwrap();
    fs::write(&webp, b"webp").unwrap();
    fx.store.add("skin", &files, Some(&png)).unwrap();

    let stored = fx.store.set_preview("skin", &webp).unwrap();

    assert_eq!(stored, fx.store.root().join("skin/.preview.webp"));
    assert!(!fx.store.root().join("skin/.preview.png").exists());
    assert!(matches!(
        fx.store.set_preview("skin", &files[0]),
        Err(VaultError::InvalidInput(_))
    ));
}

#[test]
fn test_remove_and_list_ids() {
    let fx = fixture();
    let files = write_triple(&fx.src, "skin");
    fx.store.add("b", &files, None).unwrap();
    fx.store.add("a", &files, None).unwrap();
    fs::create_dir_all(fx.store.root().join(".hidden")).unwrap();

    assert_eq!(fx.store.list_ids().unwrap(), vec!["a", "b"]);

    fx.store.remove("a").unwrap();
    fx.store.remove("a").unwrap();
    assert_eq!(fx.store.list_ids().unwrap(), vec!["b"]);
}

#[test]
fn test_entry_names_cannot_escape_root() {
    let fx = fixture();
    assert!(!fx.store.exists("../backup"));
    assert!(matches!(
        fx.store.remove("../outside"),
        Err(VaultError::InvalidInput(_))
    ));
}
