//! Legacy key list through its full lifecycle.
//!
//! 1. A legacy `.keys` text file (scheme 0 fingerprint + labels) is loaded
//! 2. The first verification migrates it to the current scheme
//! 3. The migrated list is saved as JSON and reloaded
//! 4. Passwords derived before and after the upgrade are identical

use passgen_core::{
    derive_password, Engine, EngineError, Entry, OutputMode, SchemeVersion,
};
use passgen_store::{KeyListStore, ListOrigin};
use tempfile::TempDir;

const SECRET: &str = "hunter2";
const V0_HUNTER2: &str = "Zyw5EYrZNCf4fkQMHwU5cPB+sXgg95sYjOnyETfy+3E=";

fn legacy_store() -> (TempDir, KeyListStore) {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("Default.keys"),
        format!("{V0_HUNTER2}\n\nexample.com\ngithub\nbank\n"),
    )
    .unwrap();
    let store = KeyListStore::open(dir.path()).unwrap();
    (dir, store)
}

#[test]
fn test_legacy_upgrade_lifecycle() {
    let (_dir, store) = legacy_store();
    assert_eq!(store.list_names().unwrap(), ["Default"]);

    let mut loaded = store.load("Default").unwrap();
    assert_eq!(loaded.origin, ListOrigin::Legacy);
    assert_eq!(loaded.document.scheme_version(), SchemeVersion::HmacCheck);

    let before: Vec<String> = loaded
        .document
        .entries()
        .iter()
        .map(|e| derive_password(e, SECRET).unwrap())
        .collect();

    let mut engine = Engine::new(&mut loaded.document);
    let verification = engine.verify_master(SECRET).unwrap();
    assert!(verification.matched);
    assert!(verification.document_mutated());
    assert_eq!(
        verification.changes.migrated_from,
        Some(SchemeVersion::HmacCheck)
    );

    store.save("Default", &loaded.document).unwrap();

    let mut reloaded = store.load("Default").unwrap();
    assert_eq!(reloaded.origin, ListOrigin::Current);
    assert_eq!(reloaded.document.scheme_version(), SchemeVersion::CURRENT);
    assert_eq!(reloaded.document, loaded.document);

    let mut engine = Engine::new(&mut reloaded.document);
    let verification = engine.verify_master(SECRET).unwrap();
    assert!(verification.matched);
    assert!(!verification.document_mutated());

    let after: Vec<String> = engine
        .document()
        .entries()
        .iter()
        .map(|e| engine.derive_password(e, SECRET).unwrap())
        .collect();
    assert_eq!(before, after);
    assert_eq!(after[0], "Q0/1HO8ms9F+KyEls5tyx0GCXCL1zQ212tC+o6WFpGs=");
}

#[test]
fn test_mistyped_first_check_is_persisted() {
    let (_dir, store) = legacy_store();
    let mut loaded = store.load("Default").unwrap();

    let mut engine = Engine::new(&mut loaded.document);
    let verification = engine.verify_master("hunter3").unwrap();
    assert!(!verification.matched);
    // the caller is told to persist even though the check failed
    assert!(verification.document_mutated());
    store.save("Default", &loaded.document).unwrap();

    let mut reloaded = store.load("Default").unwrap();
    let mut engine = Engine::new(&mut reloaded.document);
    assert!(!engine.verify_master(SECRET).unwrap().matched);
    assert!(engine.verify_master("hunter3").unwrap().matched);
}

#[test]
fn test_new_list_session() {
    let dir = TempDir::new().unwrap();
    let store = KeyListStore::open(dir.path()).unwrap();

    let mut loaded = store.load("work").unwrap();
    assert_eq!(loaded.origin, ListOrigin::Created);

    let mut engine = Engine::new(&mut loaded.document);
    let verification = engine.verify_master(SECRET).unwrap();
    assert!(verification.matched && verification.changes.enrolled);

    let entry = engine
        .entry_or_insert(
            Entry::new("example.com")
                .with_output_mode(OutputMode::AlphanumericOnly)
                .with_max_length(5),
        )
        .unwrap()
        .clone();
    assert_eq!(engine.derive_password(&entry, SECRET).unwrap(), "Q01HO");
    assert!(matches!(
        engine.derive_password(&entry, "hunter3"),
        Err(EngineError::MasterMismatch)
    ));

    store.save("work", &loaded.document).unwrap();
    assert_eq!(store.last_used().as_deref(), Some("work"));

    let reloaded = store.load("work").unwrap();
    assert_eq!(reloaded.document.entries(), [entry]);
}
