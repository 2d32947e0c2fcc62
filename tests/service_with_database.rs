//! End-to-end coverage of `FileHolderService` against a real Postgres
//! database. Needs `DATABASE_URL` pointed at a scratch database with the
//! `file_meta` migration applied; skipped (not failed) when unset, the
//! same accommodation most diesel-backed test suites make for a database
//! dependency that can't be faked away.

use std::time::Duration;

use filevault::config::Config;
use filevault::metastore::build_pool;
use filevault::metastore::models::FileMetaChanges;
use filevault::service::FileHolderService;
use filevault::unit_of_work::UnitOfWork;
use filevault::ErrorKind;
use tempfile::tempdir;

fn test_config(storage: &std::path::Path) -> Option<Config> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    Some(Config {
        app_host: "127.0.0.1".into(),
        app_port: 0,
        database_url,
        file_storage_path: storage.to_string_lossy().into_owned(),
        pending_file_prefix: "pending_".into(),
        lock_timeout: Duration::from_secs(2),
        db_retries: 1,
        db_retry_delay: Duration::from_millis(10),
        debug: true,
    })
}

#[test]
fn create_then_read_round_trips_bytes() {
    let storage = tempdir().unwrap();
    let Some(config) = test_config(storage.path()) else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = build_pool(&config.database_url).unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let meta = FileHolderService::create_file(
        &mut uow,
        b"hello".to_vec(),
        "notes",
        "txt",
        "/a/",
        None,
    )
    .unwrap();
    assert_eq!(meta.size, 5);
    assert!(meta.updated_at.is_none());
    uow.commit().unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let bytes = FileHolderService::get_file_bytes(&mut uow, meta.id).unwrap();
    assert_eq!(bytes, b"hello");
    uow.rollback();
}

#[test]
fn duplicate_triple_is_rejected() {
    let storage = tempdir().unwrap();
    let Some(config) = test_config(storage.path()) else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = build_pool(&config.database_url).unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    FileHolderService::create_file(&mut uow, b"one".to_vec(), "notes", "txt", "/dup/", None)
        .unwrap();
    uow.commit().unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let err =
        FileHolderService::create_file(&mut uow, b"two".to_vec(), "notes", "txt", "/dup/", None)
            .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::AlreadyExists(_)));
    uow.rollback();
}

#[test]
fn idempotent_delete_fails_the_second_time() {
    let storage = tempdir().unwrap();
    let Some(config) = test_config(storage.path()) else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = build_pool(&config.database_url).unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let meta =
        FileHolderService::create_file(&mut uow, b"bye".to_vec(), "gone", "txt", "/del/", None)
            .unwrap();
    uow.commit().unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    assert!(FileHolderService::delete_file(&mut uow, meta.id).unwrap());
    uow.commit().unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let err = FileHolderService::delete_file(&mut uow, meta.id).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound(_)));
    uow.rollback();
}

#[test]
fn search_by_path_prefix_matches_only_descendants() {
    let storage = tempdir().unwrap();
    let Some(config) = test_config(storage.path()) else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = build_pool(&config.database_url).unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    FileHolderService::create_file(&mut uow, b"x".to_vec(), "f1", "txt", "/pfx/", None).unwrap();
    FileHolderService::create_file(&mut uow, b"x".to_vec(), "f2", "txt", "/pfx/sub/", None)
        .unwrap();
    FileHolderService::create_file(&mut uow, b"x".to_vec(), "f3", "txt", "/pfxother/", None)
        .unwrap();
    uow.commit().unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let results = FileHolderService::search_by_path_prefix(&mut uow, "/pfx").unwrap();
    uow.rollback();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|m| m.path.starts_with("/pfx/")));

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let empty = FileHolderService::search_by_path_prefix(&mut uow, "").unwrap();
    uow.rollback();
    assert!(empty.is_empty());
}

#[test]
fn update_detects_collision_with_another_row() {
    let storage = tempdir().unwrap();
    let Some(config) = test_config(storage.path()) else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = build_pool(&config.database_url).unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    FileHolderService::create_file(&mut uow, b"x".to_vec(), "a", "txt", "/rename/", None).unwrap();
    let target =
        FileHolderService::create_file(&mut uow, b"y".to_vec(), "b", "txt", "/rename/", None)
            .unwrap();
    uow.commit().unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let err = FileHolderService::update_file_meta(
        &mut uow,
        target.id,
        FileMetaChanges {
            filename: Some("a".into()),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::AlreadyExists(_)));
    uow.rollback();
}

#[test]
fn sync_storage_with_db_repairs_dangling_metadata() {
    let storage = tempdir().unwrap();
    let Some(config) = test_config(storage.path()) else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = build_pool(&config.database_url).unwrap();

    // Simulate a crash between the metadata commit and the blob commit:
    // insert metadata directly through a UnitOfWork but never stage/commit
    // the corresponding blob.
    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let meta = FileHolderService::create_file(
        &mut uow,
        b"orphaned-meta".to_vec(),
        "crash",
        "bin",
        "/crash/",
        None,
    )
    .unwrap();
    // Drop the blob session's pending write before committing metadata,
    // mimicking a blob-store failure after the metadata row is durable.
    uow.commit().unwrap();
    std::fs::remove_file(storage.path().join(meta.id.to_string())).ok();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    FileHolderService::sync_storage_with_db(&mut uow).unwrap();
    uow.commit().unwrap();

    let mut uow = UnitOfWork::begin(&pool, &config).unwrap();
    let err = FileHolderService::get_file_meta(&mut uow, meta.id).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFound(_)));
    uow.rollback();
}
