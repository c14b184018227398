use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use followscan_core::{
    ExtensionState, PageType, Platform, Progress, ProgressStatus, ScrapeResult, Status,
};
use followscan_engine::{
    ensure_state_dir, replace_atomically, FileStateStore, MemoryStateStore, PersistError,
    StateStore,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn complete_state() -> ExtensionState {
    let identifiers: BTreeSet<String> = ["alice", "bob"].iter().map(|s| s.to_string()).collect();
    ExtensionState {
        status: Status::Complete,
        platform: Some(Platform::Twitter),
        page_type: Some(PageType::Following),
        source_url: Some("https://x.com/me/following".to_string()),
        progress: Some(Progress {
            count: 2,
            status: ProgressStatus::Complete,
            message: "Found 2 accounts".to_string(),
        }),
        result: Some(ScrapeResult::new(
            identifiers,
            Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
        )),
        error: None,
        upload: None,
    }
}

#[test]
fn missing_file_reads_as_idle() {
    let dir = tempdir().unwrap();
    let store = FileStateStore::new(&dir.path().join("state.ron")).unwrap();

    assert_eq!(store.read().unwrap(), ExtensionState::idle());
}

#[test]
fn written_state_is_read_back_exactly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("state.ron");
    let store = FileStateStore::new(&path).unwrap();

    store.write(&complete_state()).unwrap();

    assert!(path.exists());
    let reopened = FileStateStore::new(&path).unwrap();
    assert_eq!(reopened.read().unwrap(), complete_state());
}

#[test]
fn rewrite_replaces_the_whole_record() {
    let dir = tempdir().unwrap();
    let store = FileStateStore::new(&dir.path().join("state.ron")).unwrap();
    store.write(&complete_state()).unwrap();

    store.write(&ExtensionState::idle()).unwrap();

    assert_eq!(store.read().unwrap(), ExtensionState::idle());
    let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1, "temp files must not linger");
}

#[test]
fn corrupt_file_falls_back_to_idle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.ron");
    fs::write(&path, "(status: complete, result: ").unwrap();
    let store = FileStateStore::new(&path).unwrap();

    assert_eq!(store.read().unwrap(), ExtensionState::idle());
}

#[test]
fn inconsistent_record_falls_back_to_idle() {
    let dir = tempdir().unwrap();
    let store = FileStateStore::new(&dir.path().join("state.ron")).unwrap();
    let mut broken = complete_state();
    broken.status = Status::Scraping;
    store.write(&broken).unwrap();

    assert_eq!(store.read().unwrap(), ExtensionState::idle());
}

#[test]
fn clear_removes_the_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.ron");
    let store = FileStateStore::new(&path).unwrap();
    store.write(&complete_state()).unwrap();

    store.clear().unwrap();
    assert!(!path.exists());
    assert_eq!(store.read().unwrap(), ExtensionState::idle());

    // Clearing twice is fine.
    store.clear().unwrap();
}

#[test]
fn memory_store_clones_share_one_record() {
    let store = MemoryStateStore::new();
    let other = store.clone();
    assert_eq!(store.read().unwrap(), ExtensionState::idle());

    other.write(&complete_state()).unwrap();
    assert_eq!(store.read().unwrap(), complete_state());

    store.clear().unwrap();
    assert_eq!(other.read().unwrap(), ExtensionState::idle());
}

#[test]
fn state_path_under_a_regular_file_is_refused() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    assert!(ensure_state_dir(&blocker).is_err());
    let store = FileStateStore::new(&blocker.join("state.ron")).unwrap();
    assert!(store.write(&complete_state()).is_err());
}

#[test]
fn replacing_a_path_without_a_file_name_is_refused() {
    let err = replace_atomically(Path::new("/"), b"(status: idle)").unwrap_err();
    assert!(matches!(err, PersistError::NotAFile(_)));
    assert!(FileStateStore::new(Path::new("/")).is_err());
}
