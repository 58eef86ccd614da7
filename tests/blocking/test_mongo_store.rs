// These tests need a running mongodb, run them with `cargo test -- --ignored`.

use bson::{doc, oid::ObjectId, Document};
use mongodb::sync::{Client, Collection};
use oplog_replay::{DocId, MongoStore, Namespace, OplogReplayer, RateController, Store};

const TEST_DB: &str = "replay_test";

struct Context {
    pub store: MongoStore,
}

impl Context {
    pub fn new() -> Self {
        let client = Client::with_uri_str(
            option_env!("REPLAY_TEST_TARGET").unwrap_or("mongodb://localhost:27017"),
        )
        .unwrap();
        client.database(TEST_DB).drop(None).unwrap();
        Context {
            store: MongoStore::from_client(client),
        }
    }

    pub fn get_coll(&self, name: &str) -> Collection<Document> {
        self.store
            .get_client()
            .database(TEST_DB)
            .collection::<Document>(name)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.store.get_client().database(TEST_DB).drop(None).unwrap();
    }
}

fn ns(coll: &str) -> Namespace {
    Namespace::new(TEST_DB, coll)
}

#[test]
#[ignore]
fn test_upsert_overwrites_existing_document() {
    let mut context = Context::new();
    let id = ObjectId::new();
    let doc_id = DocId::ObjectId(id);

    context
        .store
        .upsert_by_id(&ns("students"), &doc_id, &doc! {"_id": id, "a": 1})
        .unwrap();
    context
        .store
        .upsert_by_id(&ns("students"), &doc_id, &doc! {"_id": id, "b": 2})
        .unwrap();

    let coll = context.get_coll("students");
    assert_eq!(coll.count_documents(None, None).unwrap(), 1);
    let result = coll.find_one(doc! {"_id": id}, None).unwrap().unwrap();
    assert_eq!(result, doc! {"_id": id, "b": 2});
}

#[test]
#[ignore]
fn test_update_and_delete_missing_document() {
    let mut context = Context::new();
    let doc_id = DocId::String("missing".to_string());

    assert!(!context
        .store
        .update_by_id(&ns("students"), &doc_id, &doc! {"$set": {"a": 1}})
        .unwrap());
    assert!(!context
        .store
        .update_by_id(&ns("students"), &doc_id, &doc! {"a": 1})
        .unwrap());
    assert!(!context.store.delete_by_id(&ns("students"), &doc_id).unwrap());
    assert_eq!(
        context.get_coll("students").count_documents(None, None).unwrap(),
        0
    );
}

#[test]
#[ignore]
fn test_update_diff_and_replacement() {
    let mut context = Context::new();
    let doc_id = DocId::String("studentId".to_string());
    let coll = context.get_coll("students");
    coll.insert_one(doc! {"_id": "studentId", "a": 1, "b": 1}, None)
        .unwrap();

    assert!(context
        .store
        .update_by_id(&ns("students"), &doc_id, &doc! {"$set": {"a": 2}, "$unset": {"b": ""}})
        .unwrap());
    let result = coll.find_one(doc! {"_id": "studentId"}, None).unwrap().unwrap();
    assert_eq!(result, doc! {"_id": "studentId", "a": 2});

    assert!(context
        .store
        .update_by_id(&ns("students"), &doc_id, &doc! {"c": 3})
        .unwrap());
    let result = coll.find_one(doc! {"_id": "studentId"}, None).unwrap().unwrap();
    assert_eq!(result, doc! {"_id": "studentId", "c": 3});
}

#[test]
#[ignore]
fn test_replay_log_twice() {
    let context = Context::new();
    let id = ObjectId::new();
    let entries = vec![
        doc! {"v": 2, "op": "i", "ns": "replay_test.teachers", "o": {"_id": "teacherId", "val": "x"}},
        doc! {"v": 2, "op": "i", "ns": "replay_test.students", "o": {"_id": id, "val": "x"}},
        doc! {"v": 2, "op": "u", "ns": "replay_test.teachers", "o2": {"_id": "teacherId"}, "o": {"$set": {"val": "y"}}},
        doc! {"v": 2, "op": "d", "ns": "replay_test.students", "b": true, "o": {"_id": id}},
    ];
    let mut log = vec![];
    for entry in entries.iter() {
        entry.to_writer(&mut log).unwrap();
    }

    for _ in 0..2 {
        let mut replayer = OplogReplayer::new(
            context.store.clone(),
            RateController::new(1000.0).unwrap(),
        );
        let summary = replayer.replay(log.as_slice()).unwrap();
        assert_eq!(summary.applied, 4);

        let teacher = context
            .get_coll("teachers")
            .find_one(doc! {"_id": "teacherId"}, None)
            .unwrap();
        assert_eq!(teacher, Some(doc! {"_id": "teacherId", "val": "y"}));
        assert_eq!(
            context.get_coll("students").count_documents(None, None).unwrap(),
            0
        );
    }
}
