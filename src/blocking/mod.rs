/// provide oplog replay blocking apis.
mod applier;
mod connection;
mod memory_store;
#[doc(hidden)]
pub mod oplog_reader;
mod replayer;
mod store;
mod time_helper;

pub use applier::{apply_operation, ApplyOutcome};
pub use connection::MongoStore;
pub use memory_store::MemoryStore;
pub use oplog_reader::OplogReader;
pub use replayer::{OplogReplayer, ReplayState, ReplaySummary};
pub use store::Store;
