//! Exercises the blob store's staging/commit/rollback/recover state
//! machine against a real temp directory and real advisory locks — no
//! database required. Mirrors `tests/store.rs`'s shape: build something
//! real on disk, then assert on it.

use std::time::Duration;

use filevault::blobstore::BlobStore;
use tempfile::tempdir;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(1);

#[test]
fn add_then_commit_persists_bytes() {
    let dir = tempdir().unwrap();
    let id = Uuid::new_v4();

    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    store.add(id, b"hello".to_vec()).unwrap();
    store.commit().unwrap();

    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    assert_eq!(store.get(&id).unwrap(), b"hello");
    assert!(store.exists(&id));
}

#[test]
fn rollback_discards_staged_write() {
    let dir = tempdir().unwrap();
    let id = Uuid::new_v4();

    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    store.add(id, b"discard me".to_vec()).unwrap();
    store.flush().unwrap();
    assert!(dir.path().join(format!("pending_{}", id)).exists());

    store.rollback();

    assert!(!dir.path().join(format!("pending_{}", id)).exists());
    assert!(!dir.path().join(id.to_string()).exists());
}

#[test]
fn delete_removes_committed_blob() {
    let dir = tempdir().unwrap();
    let id = Uuid::new_v4();

    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    store.add(id, b"bytes".to_vec()).unwrap();
    store.commit().unwrap();

    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    assert!(store.delete(&id).unwrap());
    assert!(!store.exists(&id));

    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    assert!(!store.delete(&id).unwrap());
}

#[test]
fn get_missing_blob_is_not_found() {
    let dir = tempdir().unwrap();
    let id = Uuid::new_v4();

    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    let err = store.get(&id).unwrap_err();
    assert!(matches!(err.kind(), filevault::ErrorKind::NotFound(_)));
}

#[test]
fn list_filters_pending_and_lock_files() {
    let dir = tempdir().unwrap();
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    store.add(a, b"a".to_vec()).unwrap();
    store.add(b, b"b".to_vec()).unwrap();
    store.commit().unwrap();

    let store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    let mut ids = store.list().unwrap();
    ids.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(ids, expected);
}

#[test]
fn recover_removes_orphan_pending_file() {
    let dir = tempdir().unwrap();
    let orphan = Uuid::new_v4();
    std::fs::write(dir.path().join(format!("pending_{}", orphan)), b"orphan").unwrap();

    BlobStore::recover(dir.path(), "pending_", TIMEOUT).unwrap();

    assert!(!dir.path().join(format!("pending_{}", orphan)).exists());
}

#[test]
fn exclusive_lock_blocks_a_second_session() {
    let dir = tempdir().unwrap();
    let id = Uuid::new_v4();

    let mut first = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    first.add(id, b"first".to_vec()).unwrap();

    let mut second = BlobStore::open(dir.path(), "pending_", Duration::from_millis(200)).unwrap();
    let err = second.add(id, b"second".to_vec()).unwrap_err();
    assert!(matches!(err.kind(), filevault::ErrorKind::LockTimeout(_)));

    drop(first);

    // Once the first session's locks are released, the id is free again.
    let mut third = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    third.add(id, b"third".to_vec()).unwrap();
    third.commit().unwrap();
}

#[test]
fn commit_is_atomic_across_restart_simulation() {
    let dir = tempdir().unwrap();
    let id = Uuid::new_v4();

    {
        let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
        store.add(id, b"payload".to_vec()).unwrap();
        store.commit().unwrap();
    }

    // Simulate process restart: a fresh session plus a recovery pass must
    // still see the committed blob and find no orphan staging file.
    BlobStore::recover(dir.path(), "pending_", TIMEOUT).unwrap();
    let mut store = BlobStore::open(dir.path(), "pending_", TIMEOUT).unwrap();
    assert_eq!(store.get(&id).unwrap(), b"payload");
}
