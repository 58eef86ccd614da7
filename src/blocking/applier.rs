//! Apply one [Operation] against a [Store], idempotently.
//!
//! mongodb behavior we rely on when an oplog is replayed more than once:
//! insert is turned into an upsert, so a document written by an earlier run is overwritten
//! instead of failing with duplicate key.
//! update and remove on a missing document succeed, a later entry of an earlier run may
//! already have removed it.

use tracing::debug;

use super::store::Store;
use crate::error::Result;
use crate::operation::Operation;

/// What a single store call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// document written or removed.
    Written,
    /// update or remove target doesn't exist, nothing to do.
    Missing,
}

/// Apply `op` against `store`, with exactly one store call.
pub fn apply_operation<S: Store + ?Sized>(op: &Operation, store: &mut S) -> Result<ApplyOutcome> {
    let found = match op {
        Operation::Insert { ns, id, doc } => {
            store.upsert_by_id(ns, id, doc)?;
            true
        }
        Operation::Update { ns, id, update } => store.update_by_id(ns, id, update)?,
        Operation::Remove { ns, id } => store.delete_by_id(ns, id)?,
    };

    if found {
        Ok(ApplyOutcome::Written)
    } else {
        debug!(kind = %op.kind(), ns = %op.namespace(), id = %op.doc_id(), "Target document not found, skip.");
        Ok(ApplyOutcome::Missing)
    }
}
