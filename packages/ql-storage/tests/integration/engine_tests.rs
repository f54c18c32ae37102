//! Record lifecycle, row ids and transaction atomicity.

use ntest::timeout;

use ql_storage::types::{infer, Complex128, Complex64};
use ql_storage::{Column, Kind, StorageError, Value, ID_HANDLE, ROOT_HANDLE};

use crate::helpers::{open, scratch};

#[timeout(5000)]
#[test]
fn test_create_read_update_delete() {
    let s = scratch();
    let db = open(&s);

    db.begin_transaction().unwrap();
    let h = db
        .create(&[Value::IdealInt(1), "first".into(), Value::Bool(true)])
        .unwrap();
    db.commit().unwrap();
    assert_eq!(
        db.read(h, &[]).unwrap(),
        vec![Value::Int64(1), Value::String("first".into()), Value::Bool(true)]
    );

    let long = "x".repeat(500);
    db.begin_transaction().unwrap();
    db.update(h, &[Value::IdealInt(2), long.as_str().into()]).unwrap();
    db.commit().unwrap();
    assert_eq!(
        db.read(h, &[]).unwrap(),
        vec![Value::Int64(2), Value::String(long)]
    );

    db.begin_transaction().unwrap();
    db.delete(h).unwrap();
    db.commit().unwrap();
    assert!(matches!(
        db.read(h, &[]),
        Err(StorageError::NotFound { handle }) if handle == h
    ));

    db.begin_transaction().unwrap();
    assert!(db.update(h, &[]).unwrap_err().is_not_found());
    assert!(db.delete(h).unwrap_err().is_not_found());
    db.rollback().unwrap();
    db.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_every_kind_round_trips_through_file() {
    let s = scratch();
    let mut values = vec![
        Value::Bool(false),
        Value::Int8(-8),
        Value::Int16(-16),
        Value::Int32(-32),
        Value::Int64(-64),
        Value::Uint8(8),
        Value::Uint16(16),
        Value::Uint32(32),
        Value::Uint64(64),
        Value::Float32(3.5),
        Value::Float64(-0.125),
        Value::Complex64(Complex64::new(1.0, 2.0)),
        Value::Complex128(Complex128::new(-1.0, 0.5)),
        Value::String("ünïcode".into()),
        Value::Null,
    ];
    let mut columns = Vec::new();
    infer(&mut values, &mut columns);

    let db = open(&s);
    db.begin_transaction().unwrap();
    let h = db.create(&values).unwrap();
    db.commit().unwrap();
    db.close().unwrap();

    let db = open(&s);
    assert_eq!(db.read(h, &columns).unwrap(), values);
    db.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_narrowing_int8_column() {
    let s = scratch();
    let db = open(&s);
    db.begin_transaction().unwrap();
    let h = db.create(&[Value::IdealInt(300)]).unwrap();
    db.commit().unwrap();

    let values = db.read(h, &[Column::new(0, Kind::Int8)]).unwrap();
    assert_eq!(values, vec![Value::Int8(44)]);
}

#[timeout(5000)]
#[test]
fn test_row_ids_are_monotonic_across_reopen() {
    let s = scratch();
    let db = open(&s);
    db.begin_transaction().unwrap();
    let ids: Vec<u64> = (0..5).map(|_| db.id().unwrap()).collect();
    db.commit().unwrap();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    db.close().unwrap();

    let db = open(&s);
    db.begin_transaction().unwrap();
    assert_eq!(db.id().unwrap(), 6);
    db.commit().unwrap();
    db.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_rollback_discards_and_commit_persists() {
    let s = scratch();
    let db = open(&s);

    db.begin_transaction().unwrap();
    let discarded = db.create(&["gone".into()]).unwrap();
    db.rollback().unwrap();
    assert!(matches!(
        db.read(discarded, &[]),
        Err(StorageError::NotFound { .. })
    ));

    db.begin_transaction().unwrap();
    let kept = db.create(&["kept".into()]).unwrap();
    db.update(ROOT_HANDLE, &[Value::IdealUint(kept)]).unwrap();
    db.commit().unwrap();
    db.close().unwrap();

    let db = open(&s);
    assert_eq!(db.read(kept, &[]).unwrap(), vec![Value::String("kept".into())]);
    assert_eq!(
        db.read(ROOT_HANDLE, &[]).unwrap(),
        vec![Value::Uint64(kept)]
    );
    db.close().unwrap();
}

#[timeout(10000)]
#[test]
fn test_verify_after_churn_and_reopen() {
    let s = scratch();
    let db = open(&s);

    db.begin_transaction().unwrap();
    let handles: Vec<_> = (0..50)
        .map(|i| db.create(&[Value::IdealInt(i), "v".repeat(i as usize).into()]).unwrap())
        .collect();
    db.commit().unwrap();

    db.begin_transaction().unwrap();
    for h in handles.iter().step_by(3) {
        db.delete(*h).unwrap();
    }
    for h in handles.iter().skip(1).step_by(3) {
        db.update(*h, &["w".repeat(200).into()]).unwrap();
    }
    db.commit().unwrap();

    let stats = db.verify().unwrap();
    assert_eq!(stats.allocs, 2 + 50 - 17);
    db.close().unwrap();

    let db = open(&s);
    assert_eq!(db.verify().unwrap(), stats);
    db.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_close_rolls_back_open_transaction() {
    let s = scratch();
    let db = open(&s);
    db.begin_transaction().unwrap();
    let h = db.create(&["uncommitted".into()]).unwrap();
    db.close().unwrap();

    let db = open(&s);
    assert!(db.read(h, &[]).is_err());
    db.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_well_known_handles_cannot_be_removed() {
    let s = scratch();
    let db = open(&s);
    db.begin_transaction().unwrap();
    assert_eq!(db.id().unwrap(), 1);

    assert!(matches!(
        db.delete(ID_HANDLE),
        Err(StorageError::ReservedHandle { handle: ID_HANDLE, .. })
    ));
    assert!(matches!(
        db.delete(ROOT_HANDLE),
        Err(StorageError::ReservedHandle { handle: ROOT_HANDLE, .. })
    ));
    assert!(matches!(
        db.update(ID_HANDLE, &["x".into()]),
        Err(StorageError::ReservedHandle { handle: ID_HANDLE, .. })
    ));
    db.update(ROOT_HANDLE, &["root".into()]).unwrap();
    db.commit().unwrap();

    db.begin_transaction().unwrap();
    assert_eq!(db.id().unwrap(), 2);
    db.commit().unwrap();
    db.close().unwrap();

    let db = open(&s);
    assert_eq!(db.current_id().unwrap(), 2);
    assert_eq!(
        db.read(ROOT_HANDLE, &[]).unwrap(),
        vec![Value::String("root".into())]
    );
    assert_eq!(db.verify().unwrap().allocs, 2);
    db.close().unwrap();
}
