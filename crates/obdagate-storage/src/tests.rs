//! Persistence tests for the mapping store

use super::*;
use std::sync::Barrier;
use std::thread;
use tempfile::tempdir;

#[test]
fn missing_document_reads_as_none() {
    let dir = tempdir().unwrap();
    let store = MappingStore::new(dir.path().join("mapping.obda"));
    assert_eq!(store.read_current().unwrap(), None);
}

#[test]
fn replace_overwrites_without_history() {
    let dir = tempdir().unwrap();
    let store = MappingStore::new(dir.path().join("nested/mapping.obda"));
    store.replace("first").unwrap();
    store.replace("second").unwrap();
    assert_eq!(store.read_current().unwrap().as_deref(), Some("second"));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1, "temporary files left behind: {leftovers:?}");
}

#[test]
fn handles_for_the_same_path_share_a_lock() {
    let dir = tempdir().unwrap();
    let a = MappingStore::new(dir.path().join("m.obda"));
    let b = MappingStore::new(dir.path().join(".").join("m.obda"));
    let c = MappingStore::new(dir.path().join("other.obda"));
    assert!(a.shares_lock_with(&b));
    assert!(!a.shares_lock_with(&c));
}

#[test]
fn concurrent_writers_never_leave_a_torn_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("m.obda");
    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|i| {
            let store = MappingStore::new(&path);
            let barrier = barrier.clone();
            thread::spawn(move || {
                let body = format!("writer-{i}\n").repeat(2000);
                barrier.wait();
                store.replace(&body).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let text = MappingStore::new(&path).read_current().unwrap().unwrap();
    let first = text.lines().next().unwrap().to_string();
    assert!(text.lines().all(|l| l == first));
    assert_eq!(text.lines().count(), 2000);
}

#[test]
fn lock_identity_survives_directory_creation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("not/yet/created/m.obda");
    let before = MappingStore::new(&path);

    std::fs::create_dir_all(dir.path().join("not/yet/created")).unwrap();
    before.replace("v1").unwrap();
    let after = MappingStore::new(&path);
    assert!(before.shares_lock_with(&after));
}

#[test]
fn relative_paths_are_keyed_from_the_working_directory() {
    let relative = Path::new("no-such-dir-for-obdagate/m.obda");
    let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
    assert_eq!(document_key(relative), cwd.join(relative));
    assert!(Arc::ptr_eq(
        &write_lock_for(relative),
        &write_lock_for(&cwd.join(relative))
    ));
}
