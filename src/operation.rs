//! Normalized replay operation, independent of the oplog encoding it came from.

use bson::oid::ObjectId;
use bson::{Bson, Document};
use std::fmt;

use crate::error::ConvertError;

/// database + collection pair an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    db_name: String,
    coll_name: String,
}

impl Namespace {
    /// construct a namespace from `db_name` and `coll_name`.
    pub fn new(db_name: impl Into<String>, coll_name: impl Into<String>) -> Self {
        Namespace {
            db_name: db_name.into(),
            coll_name: coll_name.into(),
        }
    }

    /// Parse a raw `"<database>.<collection>"` string.
    ///
    /// Only the first `.` separates database from collection, so
    /// `"archive.archive.teachers"` targets collection `archive.teachers`.
    pub fn parse(ns: &str) -> Result<Self, ConvertError> {
        match ns.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Namespace::new(db, coll)),
            _ => Err(ConvertError::InvalidNamespace(ns.to_string())),
        }
    }

    /// database name.
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// collection name.
    pub fn coll_name(&self) -> &str {
        &self.coll_name
    }

    /// Is this namespace mongodb internal metadata, like `db.system.indexes`?
    pub fn is_system(&self) -> bool {
        self.db_name == "system" || self.coll_name.starts_with("system.")
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.db_name, self.coll_name)
    }
}

/// Primary key of the target document.
///
/// Its `Display` form is the canonical string id: strings as-is, ObjectIds as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocId {
    /// string `_id`.
    String(String),
    /// ObjectId `_id`.
    ObjectId(ObjectId),
}

impl DocId {
    /// Normalize an `_id` value, only string and ObjectId keys are resolvable.
    pub fn from_bson(value: &Bson) -> Result<Self, ConvertError> {
        match value {
            Bson::String(s) => Ok(DocId::String(s.clone())),
            Bson::ObjectId(oid) => Ok(DocId::ObjectId(*oid)),
            other => Err(ConvertError::UnsupportedIdType(other.element_type())),
        }
    }

    /// native bson value, used to build `{_id: ...}` filters.
    pub fn to_bson(&self) -> Bson {
        match self {
            DocId::String(s) => Bson::String(s.clone()),
            DocId::ObjectId(oid) => Bson::ObjectId(*oid),
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocId::String(s) => f.write_str(s),
            DocId::ObjectId(oid) => f.write_str(&oid.to_hex()),
        }
    }
}

/// Operation kind, mostly used for logging and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// `i` entries.
    Insert,
    /// `u` entries.
    Update,
    /// `d` entries.
    Remove,
}

impl OpKind {
    /// lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Insert => "insert",
            OpKind::Update => "update",
            OpKind::Remove => "remove",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One change to replay.  Each kind only carries what it needs, a remove never has a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// insert a full document, replayed as an upsert.
    Insert {
        /// namespace.
        ns: Namespace,
        /// canonical `_id`.
        id: DocId,
        /// full document.
        doc: Document,
    },
    /// update a document, either a `$set`/`$unset` diff or a full replacement.
    Update {
        /// namespace.
        ns: Namespace,
        /// canonical `_id`.
        id: DocId,
        /// diff or replacement document.
        update: Document,
    },
    /// remove one document.
    Remove {
        /// namespace.
        ns: Namespace,
        /// canonical `_id`.
        id: DocId,
    },
}

impl Operation {
    /// kind of this operation.
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Insert { .. } => OpKind::Insert,
            Operation::Update { .. } => OpKind::Update,
            Operation::Remove { .. } => OpKind::Remove,
        }
    }

    /// target namespace.
    pub fn namespace(&self) -> &Namespace {
        match self {
            Operation::Insert { ns, .. } | Operation::Update { ns, .. } | Operation::Remove { ns, .. } => ns,
        }
    }

    pub fn doc_id(&self) -> &DocId {
        match self {
            Operation::Insert { id, .. } | Operation::Update { id, .. } | Operation::Remove { id, .. } => id,
        }
    }

    /// canonical string id.
    pub fn id(&self) -> String {
        self.doc_id().to_string()
    }

    /// document (insert) or diff/replacement (update), `None` for remove.
    pub fn payload(&self) -> Option<&Document> {
        match self {
            Operation::Insert { doc, .. } => Some(doc),
            Operation::Update { update, .. } => Some(update),
            Operation::Remove { .. } => None,
        }
    }
}
