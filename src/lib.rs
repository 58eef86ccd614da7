//! Oplog replay lib, which replays a captured mongodb oplog against a live mongodb.
//!
//! The replay is sequential, rate limited and idempotent: inserts become upserts, and
//! updates or removes on a missing document are successful no-ops.  So an interrupted replay
//! can always be fixed by running the whole log again.
//!
//! Provides [OplogReplayer] to drive the replay, [MongoStore] and [MemoryStore] as targets.
//!
//! # Example:
//! ```no_run
//! use oplog_replay::{MongoStore, OplogReplayer, RateController};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let store = MongoStore::new("mongodb://localhost:27017").unwrap();
//! let rate = RateController::new(500.0).unwrap();
//! let mut replayer = OplogReplayer::new(store, rate);
//! let summary = replayer.replay(BufReader::new(File::open("oplog.bson").unwrap())).unwrap();
//! println!("applied {} operations", summary.applied);
//! ```

#![warn(missing_docs)]

#[doc(hidden)]
pub mod blocking;
mod config;
mod error;
mod operation;
pub mod oplog;
mod throttle;

/// only oplog format version this crate understands.
const SUPPORTED_OPLOG_VERSION: i64 = 2;

/// mongodb internal database for admin.
const ADMIN_DB_NAME: &str = "admin";

/// oplog namespace key name.
const NAMESPACE_KEY: &str = "ns";
/// oplog timestamp key name.
const TIMESTAMP_KEY: &str = "ts";
/// oplog operation key name.
const OP_KEY: &str = "op";
/// oplog version key name.
const VERSION_KEY: &str = "v";
/// oplog object key name.
const OBJ_KEY: &str = "o";
/// oplog secondary object key name, holds update target.
const OBJ2_KEY: &str = "o2";
/// single document marker on delete, upsert flag on update.
const SINGLE_DOC_KEY: &str = "b";
/// document primary key name.
const ID_KEY: &str = "_id";

/// insert operation.
const INSERT_OP: &str = "i";
/// update operation.
const UPDATE_OP: &str = "u";
/// delete operation.
const DELETE_OP: &str = "d";

pub use blocking::{
    apply_operation, ApplyOutcome, MemoryStore, MongoStore, OplogReader, OplogReplayer,
    ReplayState, ReplaySummary, Store,
};
pub use config::ReplayConf;
pub use error::{ConvertError, ReplayError, Result};
pub use operation::{DocId, Namespace, OpKind, Operation};
pub use throttle::RateController;
