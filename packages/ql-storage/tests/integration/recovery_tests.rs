//! Unclean shutdown detection, advisory locking and bootstrap failure paths.

use std::fs;

use ntest::timeout;

use ql_storage::identity::{FileIdentity, MAGIC};
use ql_storage::wal::inspect_wal;
use ql_storage::{FileStorage, StorageConfig, StorageError, Value};

use crate::helpers::{open, scratch};

fn assert_no_companions(identity: &FileIdentity) {
    assert!(!identity.lock_path().exists(), "lock file left behind");
    assert!(!identity.wal_path().exists(), "WAL file left behind");
}

#[timeout(5000)]
#[test]
fn test_non_empty_wal_refuses_open() {
    let s = scratch();
    let db = open(&s);
    db.begin_transaction().unwrap();
    let h = db.create(&["committed".into()]).unwrap();
    db.commit().unwrap();
    db.close().unwrap();

    let before = fs::read(&s.path).unwrap();
    let identity = FileIdentity::new(&s.path).unwrap();
    fs::write(identity.wal_path(), b"half-written commit").unwrap();

    match FileStorage::open(&s.path, &StorageConfig::default()) {
        Err(StorageError::UncleanShutdown { path }) => assert_eq!(path, identity.wal_path()),
        Err(other) => panic!("expected unclean shutdown, got {other:?}"),
        Ok(_) => panic!("expected unclean shutdown, got an open database"),
    }

    assert_eq!(fs::read(&s.path).unwrap(), before);
    assert_eq!(
        fs::read(identity.wal_path()).unwrap(),
        b"half-written commit"
    );
    assert!(!identity.lock_path().exists());

    assert!(matches!(
        inspect_wal(identity.wal_path()),
        Err(StorageError::BadFormat(_))
    ));

    fs::remove_file(identity.wal_path()).unwrap();
    let db = open(&s);
    assert_eq!(db.read(h, &[]).unwrap(), vec![Value::String("committed".into())]);
    db.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_empty_leftover_wal_is_reused() {
    let s = scratch();
    open(&s).close().unwrap();

    let identity = FileIdentity::new(&s.path).unwrap();
    fs::write(identity.wal_path(), b"").unwrap();
    let db = open(&s);
    assert_eq!(db.verify().unwrap().allocs, 2);
    db.close().unwrap();
    assert_no_companions(&identity);
}

#[timeout(5000)]
#[test]
fn test_second_open_is_locked_until_close() {
    let s = scratch();
    let first = open(&s);

    assert!(matches!(
        FileStorage::open(&s.path, &StorageConfig::default()),
        Err(StorageError::Locked { .. })
    ));
    assert!(first.wal_path().exists());
    assert!(first.lock_path().exists());

    first.close().unwrap();
    let second = open(&s);
    second.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_bad_magic_is_rejected_without_leftovers() {
    let s = scratch();
    let mut garbage = MAGIC.to_vec();
    garbage[1] = b'x';
    garbage.extend_from_slice(&[0u8; 32]);
    fs::write(&s.path, &garbage).unwrap();

    assert!(matches!(
        FileStorage::open(&s.path, &StorageConfig::default()),
        Err(StorageError::BadFormat(_))
    ));
    assert_eq!(fs::read(&s.path).unwrap(), garbage);
    assert_no_companions(&FileIdentity::new(&s.path).unwrap());
}

#[timeout(5000)]
#[test]
fn test_short_file_is_bad_format() {
    let s = scratch();
    fs::write(&s.path, &MAGIC[..10]).unwrap();
    assert!(matches!(
        FileStorage::open(&s.path, &StorageConfig::default()),
        Err(StorageError::BadFormat(_))
    ));
    assert_no_companions(&FileIdentity::new(&s.path).unwrap());
}

#[timeout(5000)]
#[test]
fn test_header_without_row_id_record_is_bad_format() {
    let s = scratch();
    fs::write(&s.path, MAGIC).unwrap();
    assert!(matches!(
        FileStorage::open(&s.path, &StorageConfig::default()),
        Err(StorageError::BadFormat(_))
    ));
    assert_no_companions(&FileIdentity::new(&s.path).unwrap());
}

#[timeout(5000)]
#[test]
fn test_locked_open_does_not_touch_companions() {
    let s = scratch();
    let first = open(&s);
    let err = FileStorage::open(&s.path, &StorageConfig::default()).err();
    assert!(matches!(err, Some(StorageError::Locked { .. })));

    // The refused open must not have removed the holder's WAL.
    assert!(first.wal_path().exists());
    first.begin_transaction().unwrap();
    first.create(&["still usable".into()]).unwrap();
    first.commit().unwrap();
    first.close().unwrap();
}
