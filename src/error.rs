use bson::spec::ElementType;
use mongodb::error::Error as MongoError;
use std::result::Result as StdResult;
use thiserror::Error;

/// Reasons a single oplog entry can't be turned into an operation.
#[derive(Error, Debug, PartialEq)]
pub enum ConvertError {
    /// entry has no string `op` field.
    #[error("Missing op type")]
    MissingOpType,
    /// entry has no string `ns` field.
    #[error("Missing namespace")]
    MissingNamespace,
    /// entry has no numeric `v` field.
    #[error("Missing version field")]
    MissingVersion,
    /// `v` is not 2.
    #[error("Unsupported oplog version {0}")]
    UnsupportedVersion(i64),
    /// `ns` can't be split into database and collection.
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),
    /// entry has no `o` document.
    #[error("Missing object field")]
    MissingObject,
    /// `op` is not one of `i`, `u`, `d`.
    #[error("Unknown op type {0}")]
    UnknownOpType(String),
    /// insert payload has no `_id`.
    #[error("Insert missing 'o._id' field")]
    InsertMissingId,
    /// update has no `o2._id`.
    #[error("Update missing 'o2._id' field")]
    UpdateMissingId,
    /// delete payload has no `_id`.
    #[error("Delete missing 'o._id' field")]
    DeleteMissingId,
    /// `_id` is neither a string nor an ObjectId.
    #[error("Unsupported _id type {0:?}, only string and ObjectId are supported")]
    UnsupportedIdType(ElementType),
    /// update uses an operator other than `$set` and `$unset`.
    #[error("Invalid key {0} in update object")]
    InvalidUpdateKey(String),
    /// update payload holds both operators and plain fields.
    #[error("Update object mixes operator key {operator} with plain field {field}")]
    MixedUpdateObject {
        /// first operator key.
        operator: String,
        /// first plain key.
        field: String,
    },
    /// update carries the upsert flag.
    #[error("Unknown field 'b' in update")]
    UnexpectedUpsertFlag,
    /// delete without `b: true`.
    #[error("single-document marker not set for remove")]
    RemoveMarkerNotSet,
    /// raw bytes aren't a valid bson document.
    #[error("Malformed bson document: {0}")]
    MalformedDocument(String),
}

/// Everything that can stop a replay.  Every variant is fatal, nothing is retried.
#[derive(Error, Debug)]
pub enum ReplayError {
    /// target mongodb failed.
    #[error("Mongodb error: {0}")]
    MongoError(#[from] MongoError),
    /// reading the input failed.
    #[error("Read oplog stream failed: {0}")]
    IoError(#[from] std::io::Error),
    /// input ends in the middle of an entry.
    #[error("Oplog stream is truncated, entry #{entry} expects {expected} bytes but only {actual} are available")]
    TruncatedEntry {
        /// 1-based entry index.
        entry: u64,
        /// bytes the entry needs.
        expected: usize,
        /// bytes available.
        actual: usize,
    },
    /// entry bytes aren't a valid bson document.
    #[error("Oplog entry #{entry} can't be decoded: {source}")]
    MalformedEntry {
        /// 1-based entry index.
        entry: u64,
        /// underlying error.
        #[source]
        source: ConvertError,
    },
    /// entry length prefix is out of range.
    #[error("Oplog entry #{entry} declares an invalid length {len}")]
    InvalidEntryLength {
        /// 1-based entry index.
        entry: u64,
        /// declared length.
        len: i32,
    },
    /// entry can't be converted into an operation.
    #[error("Failed to convert oplog entry #{entry} (op: {op}, ns: {ns}{ts}): {source}")]
    ConvertError {
        /// 1-based entry index.
        entry: u64,
        /// `op` tag, `<missing>` when absent.
        op: String,
        /// namespace.
        ns: String,
        /// rendered entry timestamp, empty when absent.
        ts: String,
        /// underlying error.
        #[source]
        source: ConvertError,
    },
    /// store failed to apply an operation.
    #[error("Failed to apply {kind} on {ns} for _id {id} (oplog entry #{entry}): {source}")]
    ApplyError {
        /// 1-based entry index.
        entry: u64,
        /// operation kind.
        kind: &'static str,
        /// namespace.
        ns: String,
        /// canonical `_id`.
        id: String,
        /// underlying error.
        #[source]
        source: Box<ReplayError>,
    },
    /// store refused an update it can't express.
    #[error("Store rejected update for _id {id} in {ns}: {detail}")]
    StoreRejected {
        /// namespace.
        ns: String,
        /// canonical `_id`.
        id: String,
        /// why it was refused.
        detail: String,
    },
    /// replayer was already run.
    #[error("Replay already started, create a new replayer to replay again")]
    AlreadyStarted,
    /// operations per second is not a positive finite number.
    #[error("Invalid replay speed {0}, operations per second must be a positive number")]
    InvalidSpeed(f64),
    /// configuration file is not valid toml.
    #[error("Load configuration failed: {0}")]
    ConfigError(#[from] toml::de::Error),
    /// configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result of replay operations.
pub type Result<T> = StdResult<T, ReplayError>;
