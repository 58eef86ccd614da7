use bson::{doc, oid::ObjectId, Document};
use oplog_replay::{
    MemoryStore, Namespace, OplogReplayer, RateController, ReplayError, ReplayState,
};
use std::time::{Duration, Instant};

fn encode(docs: &[Document]) -> Vec<u8> {
    let mut bytes = vec![];
    for d in docs {
        d.to_writer(&mut bytes).unwrap();
    }
    bytes
}

fn fast() -> RateController {
    RateController::new(100_000.0).unwrap()
}

fn replay_into(store: &mut MemoryStore, log: &[u8]) -> Result<u64, ReplayError> {
    let mut replayer = OplogReplayer::new(store, fast());
    replayer.replay(log).map(|s| s.applied)
}

fn insert(ns: &str, id: &str, val: i32) -> Document {
    doc! {"v": 2, "op": "i", "ns": ns, "o": {"_id": id, "val": val}}
}

fn set(ns: &str, id: &str, val: i32) -> Document {
    doc! {"v": 2, "op": "u", "ns": ns, "o2": {"_id": id}, "o": {"$set": {"val": val}}}
}

fn remove(ns: &str, id: &str) -> Document {
    doc! {"v": 2, "op": "d", "ns": ns, "b": true, "o": {"_id": id}}
}

fn mixed_log() -> Vec<Document> {
    vec![
        insert("school.teachers", "t1", 1),
        insert("school.students", "s1", 1),
        insert("school.students", "s2", 1),
        set("school.teachers", "t1", 2),
        doc! {"v": 2, "op": "u", "ns": "school.students", "o2": {"_id": "s1"}, "o": {"name": "replaced"}},
        remove("school.students", "s2"),
        doc! {"v": 2, "op": "u", "ns": "school.students", "o2": {"_id": "s1"}, "o": {"$unset": {"name": ""}, "$set": {"grade": 3}}},
        doc! {"v": 2, "op": "i", "ns": "school.system.indexes", "o": {"key": {"val": 1}, "name": "val_1", "ns": "school.students"}},
    ]
}

#[test]
fn test_replay_twice_is_idempotent() {
    let log = encode(&mixed_log());
    let mut store = MemoryStore::new();

    assert_eq!(replay_into(&mut store, &log).unwrap(), 7);
    let first = store.clone();
    assert_eq!(replay_into(&mut store, &log).unwrap(), 7);

    assert_eq!(store, first);
    let students = Namespace::new("school", "students");
    assert_eq!(
        store.get(&students, "s1"),
        Some(&doc! {"_id": "s1", "grade": 3})
    );
    assert_eq!(store.get(&students, "s2"), None);
    assert_eq!(
        store.get(&Namespace::new("school", "teachers"), "t1"),
        Some(&doc! {"_id": "t1", "val": 2})
    );
}

#[test]
fn test_rerun_after_interrupted_replay() {
    let entries = mixed_log();
    let full = encode(&entries);

    let mut expected = MemoryStore::new();
    replay_into(&mut expected, &full).unwrap();

    // first run stopped after 6 entries, second run replays everything from the start.
    let mut store = MemoryStore::new();
    replay_into(&mut store, &encode(&entries[..6])).unwrap();
    replay_into(&mut store, &full).unwrap();
    assert_eq!(store, expected);
}

#[test]
fn test_insert_update_remove_in_order() {
    let log = encode(&[
        insert("school.students", "s1", 1),
        set("school.students", "s1", 2),
        remove("school.students", "s1"),
    ]);
    let mut store = MemoryStore::new();
    replay_into(&mut store, &log).unwrap();
    assert_eq!(store.total_count(), 0);
}

#[test]
fn test_out_of_order_update_is_not_equivalent() {
    let in_order = encode(&[insert("school.students", "s1", 1), set("school.students", "s1", 2)]);
    let out_of_order = encode(&[set("school.students", "s1", 2), insert("school.students", "s1", 1)]);

    let mut ordered_store = MemoryStore::new();
    replay_into(&mut ordered_store, &in_order).unwrap();
    let mut reordered_store = MemoryStore::new();
    replay_into(&mut reordered_store, &out_of_order).unwrap();

    let students = Namespace::new("school", "students");
    assert_eq!(
        ordered_store.get(&students, "s1"),
        Some(&doc! {"_id": "s1", "val": 2})
    );
    assert_eq!(
        reordered_store.get(&students, "s1"),
        Some(&doc! {"_id": "s1", "val": 1})
    );
    assert_ne!(ordered_store, reordered_store);
}

#[test]
fn test_object_id_keys() {
    let id = ObjectId::new();
    let log = encode(&[
        doc! {"v": 2, "op": "i", "ns": "school.students", "o": {"_id": id, "val": 1}},
        doc! {"v": 2, "op": "u", "ns": "school.students", "o2": {"_id": id}, "o": {"$set": {"val": 2}}},
    ]);
    let mut store = MemoryStore::new();
    replay_into(&mut store, &log).unwrap();
    assert_eq!(
        store.get(&Namespace::new("school", "students"), &id.to_hex()),
        Some(&doc! {"_id": id, "val": 2})
    );
}

#[test]
fn test_replay_respects_rate() {
    let entries: Vec<Document> = (0..10)
        .map(|i| insert("throttle.test", &format!("id{}", i), i))
        .collect();
    let log = encode(&entries);

    let mut replayer = OplogReplayer::new(MemoryStore::new(), RateController::new(20.0).unwrap());
    let start = Instant::now();
    let summary = replayer.replay(log.as_slice()).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.applied, 10);
    // 10 operations at 20 per second: the last one starts at 450ms.
    assert!(elapsed >= Duration::from_millis(450), "too fast: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(950), "too slow: {:?}", elapsed);
    assert_eq!(replayer.store().count(&Namespace::new("throttle", "test")), 10);
}

#[test]
fn test_dropped_entries_are_not_paced() {
    let mut entries: Vec<Document> = (0..20)
        .map(|_| doc! {"v": 2, "op": "i", "ns": "a.system.indexes", "o": {"key": {"a": 1}, "name": "a_1"}})
        .collect();
    entries.push(insert("a.b", "x", 1));
    let log = encode(&entries);

    let mut replayer = OplogReplayer::new(MemoryStore::new(), RateController::new(2.0).unwrap());
    let start = Instant::now();
    let summary = replayer.replay(log.as_slice()).unwrap();

    assert_eq!((summary.applied, summary.dropped), (1, 20));
    assert!(start.elapsed() < Duration::from_millis(400));
}

#[test]
fn test_unsupported_version_aborts() {
    let log = encode(&[
        insert("school.students", "s1", 1),
        doc! {"v": 1, "op": "i", "ns": "school.students", "o": {"_id": "s2"}},
        insert("school.students", "s3", 1),
    ]);
    let mut replayer = OplogReplayer::new(MemoryStore::new(), fast());
    let err = replayer.replay(log.as_slice()).unwrap_err();

    assert_eq!(replayer.state(), ReplayState::Aborted);
    assert_eq!(replayer.applied(), 1);
    assert_eq!(
        err.to_string(),
        "Failed to convert oplog entry #2 (op: i, ns: school.students): Unsupported oplog version 1"
    );
    assert_eq!(replayer.store().count(&Namespace::new("school", "students")), 1);
}

#[test]
fn test_multi_document_remove_aborts() {
    let log = encode(&[doc! {"v": 2, "op": "d", "ns": "school.students", "o": {"_id": "s1"}}]);
    let mut store = MemoryStore::new();
    let err = replay_into(&mut store, &log).unwrap_err();
    assert!(err
        .to_string()
        .ends_with("single-document marker not set for remove"));
}

#[test]
fn test_truncated_log_aborts() {
    let mut log = encode(&[insert("school.students", "s1", 1), insert("school.students", "s2", 1)]);
    log.truncate(log.len() - 1);
    let mut store = MemoryStore::new();
    assert!(matches!(
        replay_into(&mut store, &log),
        Err(ReplayError::TruncatedEntry { entry: 2, .. })
    ));
    assert_eq!(store.total_count(), 1);
}
