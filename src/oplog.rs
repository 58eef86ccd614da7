//! Convert raw oplog entries into [Operation]s.
//!
//! Useful fields of an oplog entry:
//! ts: The time when the oplog entry was created. (Timestamp)
//! v: Version, only version 2 is understood here. (i32)
//! op: The operation type. (String)
//! ns: The namespace on which to apply the operation. (String)
//! o: The operation applied. (Document)
//! o2: Additional information about the operation applied, for update it holds the target `_id`. (Document)
//! b: For delete it's set to true when only one document is removed, for update it means upsert. (bool)
//!
//! For `op` field:
//! "i": Insert
//! "u": Update
//! "d": Delete
//!
//! Everything else ("c" command, "n" noop...) is rejected.

use bson::{Bson, Document};
use tracing::debug;

use crate::error::ConvertError;
use crate::operation::{DocId, Namespace, Operation};
use crate::{
    DELETE_OP, ID_KEY, INSERT_OP, NAMESPACE_KEY, OBJ2_KEY, OBJ_KEY, OP_KEY, SINGLE_DOC_KEY,
    SUPPORTED_OPLOG_VERSION, UPDATE_OP, VERSION_KEY,
};

type ConvertResult<T> = std::result::Result<T, ConvertError>;

const SET_OPERATOR: &str = "$set";
const UNSET_OPERATOR: &str = "$unset";

/// Convert one oplog entry.
///
/// Returns `Ok(None)` for entries which have no document level equivalent, like changes to
/// `system.indexes`.  Those are dropped rather than treated as errors.
///
/// # Example
/// ```
/// use bson::doc;
/// use oplog_replay::oplog::convert;
/// use oplog_replay::OpKind;
///
/// let entry = doc! {"v": 2, "op": "i", "ns": "test.teachers", "o": {"_id": "teacherId", "val": "x"}};
/// let op = convert(&entry).unwrap().unwrap();
/// assert_eq!(op.kind(), OpKind::Insert);
/// assert_eq!(op.id(), "teacherId");
/// ```
pub fn convert(entry: &Document) -> ConvertResult<Option<Operation>> {
    let op_type = entry
        .get_str(OP_KEY)
        .map_err(|_| ConvertError::MissingOpType)?;
    let raw_ns = entry
        .get_str(NAMESPACE_KEY)
        .map_err(|_| ConvertError::MissingNamespace)?;
    check_version(entry)?;

    let ns = Namespace::parse(raw_ns)?;
    if ns.is_system() {
        debug!(%ns, op = op_type, "Drop oplog entry on system namespace.");
        return Ok(None);
    }

    match op_type {
        INSERT_OP => make_insert_op(entry, ns),
        UPDATE_OP => make_update_op(entry, ns).map(Some),
        DELETE_OP => make_remove_op(entry, ns).map(Some),
        other => Err(ConvertError::UnknownOpType(other.to_string())),
    }
}

/// Decode one raw bson document and [convert] it.
pub fn convert_bytes(bytes: &[u8]) -> ConvertResult<Option<Operation>> {
    let mut reader = bytes;
    let entry = Document::from_reader(&mut reader)
        .map_err(|e| ConvertError::MalformedDocument(e.to_string()))?;
    convert(&entry)
}

fn check_version(entry: &Document) -> ConvertResult<()> {
    let version = match entry.get(VERSION_KEY) {
        Some(Bson::Int32(v)) => *v as i64,
        Some(Bson::Int64(v)) => *v,
        Some(Bson::Double(v)) if v.fract() == 0.0 => *v as i64,
        _ => return Err(ConvertError::MissingVersion),
    };
    if version != SUPPORTED_OPLOG_VERSION {
        return Err(ConvertError::UnsupportedVersion(version));
    }
    Ok(())
}

fn get_obj(entry: &Document) -> ConvertResult<&Document> {
    entry
        .get_document(OBJ_KEY)
        .map_err(|_| ConvertError::MissingObject)
}

fn make_insert_op(entry: &Document, ns: Namespace) -> ConvertResult<Option<Operation>> {
    let obj = get_obj(entry)?;
    let id = match obj.get(ID_KEY) {
        Some(id) => DocId::from_bson(id)?,
        // old servers record index builds as inserts into `system.indexes`, which are already
        // filtered by namespace.  Catch any index spec that slips through anyway.
        None if looks_like_index_spec(obj) => {
            debug!(%ns, "Drop index specification insert.");
            return Ok(None);
        }
        None => return Err(ConvertError::InsertMissingId),
    };
    Ok(Some(Operation::Insert {
        ns,
        id,
        doc: obj.clone(),
    }))
}

fn make_update_op(entry: &Document, ns: Namespace) -> ConvertResult<Operation> {
    // upsert flag.  Never seen on real update entries, an upserted document is logged as insert.
    if entry.contains_key(SINGLE_DOC_KEY) {
        return Err(ConvertError::UnexpectedUpsertFlag);
    }

    let id = match entry.get_document(OBJ2_KEY).ok().and_then(|o2| o2.get(ID_KEY)) {
        Some(id) => DocId::from_bson(id)?,
        None => return Err(ConvertError::UpdateMissingId),
    };

    let obj = get_obj(entry)?;
    check_update_keys(obj)?;
    Ok(Operation::Update {
        ns,
        id,
        update: obj.clone(),
    })
}

/// Only `$set` and `$unset` are allowed.  Other update operators are written to the oplog as
/// one of these two, e.g. `$addToSet` becomes `{"$set": {"key.1": "value"}}`.
fn check_update_keys(obj: &Document) -> ConvertResult<()> {
    let mut operator = None;
    let mut field = None;
    for key in obj.keys() {
        if key.starts_with('$') {
            if key != SET_OPERATOR && key != UNSET_OPERATOR {
                return Err(ConvertError::InvalidUpdateKey(key.clone()));
            }
            operator.get_or_insert(key);
        } else {
            field.get_or_insert(key);
        }
    }

    if let (Some(operator), Some(field)) = (operator, field) {
        return Err(ConvertError::MixedUpdateObject {
            operator: operator.clone(),
            field: field.clone(),
        });
    }
    Ok(())
}

fn make_remove_op(entry: &Document, ns: Namespace) -> ConvertResult<Operation> {
    let id = match get_obj(entry)?.get(ID_KEY) {
        Some(id) => DocId::from_bson(id)?,
        None => return Err(ConvertError::DeleteMissingId),
    };

    // always true for single document deletes, anything else is a multi delete we can't replay.
    if !matches!(entry.get(SINGLE_DOC_KEY), Some(Bson::Boolean(true))) {
        return Err(ConvertError::RemoveMarkerNotSet);
    }
    Ok(Operation::Remove { ns, id })
}

fn looks_like_index_spec(obj: &Document) -> bool {
    obj.get_document("key").is_ok() && obj.get_str("name").is_ok()
}
