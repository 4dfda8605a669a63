//! Tests for the JSON-file preference store

use loudcal_core::prefs::keys;
use loudcal_core::{JsonFileStore, KeyValueStore, Namespace, PreferencesExt};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs.json");

    {
        let store = JsonFileStore::open(&path).unwrap();
        store
            .set_many(
                Namespace::Convolver,
                &[
                    (keys::CONVOLVER_ENABLE, json!(true)),
                    (keys::CONVOLVER_FILE, json!("Convolver/50.0-80.0_filter.wav")),
                ],
            )
            .unwrap();
        store
            .set(Namespace::App, keys::LOUDNESS_TARGET_PHON, json!(72.3))
            .unwrap();
    }

    let store = JsonFileStore::open(&path).unwrap();
    assert_eq!(
        store.get_bool(Namespace::Convolver, keys::CONVOLVER_ENABLE).unwrap(),
        Some(true)
    );
    assert_eq!(
        store
            .get_string(Namespace::Convolver, keys::CONVOLVER_FILE)
            .unwrap()
            .as_deref(),
        Some("Convolver/50.0-80.0_filter.wav")
    );
    let target = store
        .get_f32(Namespace::App, keys::LOUDNESS_TARGET_PHON)
        .unwrap()
        .unwrap();
    assert!((target - 72.3).abs() < 1e-4);
}

#[test]
fn test_file_is_grouped_by_namespace() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs.json");
    let store = JsonFileStore::open(&path).unwrap();

    store
        .set(Namespace::Liveprog, keys::LIVEPROG_ENABLE, json!(true))
        .unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["dsp_liveprog"]["liveprog_enable"], json!(true));
}

#[test]
fn test_remove_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs.json");
    let store = JsonFileStore::open(&path).unwrap();

    store.set(Namespace::App, "a", json!(1)).unwrap();
    store.remove(Namespace::App, "a").unwrap();

    let reopened = JsonFileStore::open(&path).unwrap();
    assert!(reopened.get(Namespace::App, "a").unwrap().is_none());
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("prefs.json");
    std::fs::write(&path, "{not json").unwrap();

    assert!(JsonFileStore::open(&path).is_err());
}

#[test]
fn test_missing_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::open(dir.path().join("nested/prefs.json")).unwrap();
    assert!(store.get(Namespace::App, "anything").unwrap().is_none());

    store.set(Namespace::App, "k", json!("v")).unwrap();
    assert!(dir.path().join("nested/prefs.json").exists());
}
