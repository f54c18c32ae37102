//! Ephemeral sort/group stores opened from a database.

use ntest::timeout;

use ql_storage::{FileStorage, StorageConfig, StorageError, Value};

use crate::helpers::{open, scratch};

fn drain(store: &ql_storage::TempStore) -> Vec<(Vec<Value>, Vec<Value>)> {
    store
        .seek_first()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[timeout(5000)]
#[test]
fn test_sort_ascending_and_descending() {
    let s = scratch();
    let db = open(&s);

    for (ascending, expected) in [(true, [1, 2, 3]), (false, [3, 2, 1])] {
        let mut store = db.create_temp(ascending).unwrap();
        for n in [3, 1, 2] {
            store
                .set(&[Value::IdealInt(n)], &[format!("row {n}").into()])
                .unwrap();
        }
        let keys: Vec<Value> = drain(&store).into_iter().map(|(k, _)| k[0].clone()).collect();
        let expected: Vec<Value> = expected.iter().map(|n| Value::Int64(*n)).collect();
        assert_eq!(keys, expected);
        store.drop_store().unwrap();
    }
    db.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_group_by_accumulates_under_composite_keys() {
    let s = scratch();
    let db = open(&s);
    let mut store = db.create_temp(true).unwrap();

    let rows = [("eu", 2020, 5), ("us", 2021, 1), ("eu", 2020, 7), ("eu", 2019, 2)];
    for (region, year, amount) in rows {
        let key = [region.into(), Value::IdealInt(year)];
        let total = match store.get(&key) {
            Ok(values) => match values[0] {
                Value::Int64(sum) => sum,
                ref other => panic!("unexpected {other:?}"),
            },
            Err(StorageError::KeyNotFound) => 0,
            Err(e) => panic!("lookup failed: {e}"),
        };
        store.set(&key, &[Value::IdealInt(total + amount)]).unwrap();
    }

    let groups = drain(&store);
    assert_eq!(groups.len(), 3);
    assert_eq!(
        groups[0],
        (
            vec![Value::String("eu".into()), Value::Int64(2019)],
            vec![Value::Int64(2)]
        )
    );
    assert_eq!(groups[1].1, vec![Value::Int64(12)]);
    assert_eq!(groups[2].0[0], Value::String("us".into()));
    db.close().unwrap();
}

#[timeout(5000)]
#[test]
fn test_dropped_store_leaves_no_files() {
    let s = scratch();
    let scratch_dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        temp_dir: Some(scratch_dir.path().to_path_buf()),
        ..StorageConfig::default()
    };
    let db = FileStorage::open(&s.path, &config).unwrap();

    let mut store = db.create_temp(true).unwrap();
    for i in 0..200 {
        store
            .set(&[Value::IdealInt(i % 50)], &["payload".repeat(10).into()])
            .unwrap();
    }
    assert_eq!(store.len(), 50);
    assert_eq!(std::fs::read_dir(scratch_dir.path()).unwrap().count(), 1);

    store.drop_store().unwrap();
    store.drop_store().unwrap();
    assert_eq!(std::fs::read_dir(scratch_dir.path()).unwrap().count(), 0);
    db.close().unwrap();
}
