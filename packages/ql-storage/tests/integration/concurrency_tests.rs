//! Concurrent readers sharing one open database.

use std::sync::{Arc, Barrier};
use std::thread;

use ntest::timeout;

use ql_storage::{Column, Kind, Value};

use crate::helpers::{open, scratch};

#[timeout(10000)]
#[test]
fn test_concurrent_readers_see_committed_values() {
    let s = scratch();
    let db = Arc::new(open(&s));

    db.begin_transaction().unwrap();
    let handles: Vec<_> = (0..20)
        .map(|i| db.create(&[Value::IdealInt(i), format!("row-{i}").into()]).unwrap())
        .collect();
    db.commit().unwrap();
    let handles = Arc::new(handles);

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let db = Arc::clone(&db);
            let handles = Arc::clone(&handles);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let columns = [Column::new(0, Kind::Int32), Column::new(1, Kind::String)];
                let mut seen = Vec::new();
                for _ in 0..50 {
                    for h in handles.iter() {
                        seen.push(db.read(*h, &columns).unwrap());
                    }
                }
                seen
            })
        })
        .collect();

    let results: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    for seen in &results {
        assert_eq!(seen, &results[0]);
    }
    assert_eq!(
        results[0][3],
        vec![Value::Int32(3), Value::String("row-3".into())]
    );
    db.close().unwrap();
}

#[timeout(10000)]
#[test]
fn test_writer_commits_are_visible_to_readers() {
    let s = scratch();
    let db = Arc::new(open(&s));

    db.begin_transaction().unwrap();
    let h = db.create(&[Value::IdealInt(0)]).unwrap();
    db.commit().unwrap();

    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for i in 1..=100 {
                db.begin_transaction().unwrap();
                db.update(h, &[Value::IdealInt(i)]).unwrap();
                db.commit().unwrap();
            }
        })
    };

    let mut last = 0;
    while !writer.is_finished() {
        match db.read(h, &[]).unwrap()[0] {
            Value::Int64(v) => {
                assert!(v >= last, "value went backwards: {v} after {last}");
                last = v;
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }
    writer.join().unwrap();
    assert_eq!(db.read(h, &[]).unwrap(), vec![Value::Int64(100)]);
    db.close().unwrap();
}
