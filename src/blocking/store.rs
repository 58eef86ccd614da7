use bson::Document;

use crate::error::Result;
use crate::operation::{DocId, Namespace};

/// Target of a replay, keyed by namespace and `_id` only.
///
/// Updates and deletes on a missing document are not errors, they return `Ok(false)`.
pub trait Store {
    /// Insert `doc`, or replace the whole document when `id` already exists.
    fn upsert_by_id(&mut self, ns: &Namespace, id: &DocId, doc: &Document) -> Result<()>;

    /// Apply `update` to document `id`, it's either a `$set`/`$unset` diff or a full
    /// replacement.  Returns whether the document was found.
    fn update_by_id(&mut self, ns: &Namespace, id: &DocId, update: &Document) -> Result<bool>;

    /// Delete document `id`.  Returns whether the document was found.
    fn delete_by_id(&mut self, ns: &Namespace, id: &DocId) -> Result<bool>;
}

impl<S: Store + ?Sized> Store for &mut S {
    fn upsert_by_id(&mut self, ns: &Namespace, id: &DocId, doc: &Document) -> Result<()> {
        (**self).upsert_by_id(ns, id, doc)
    }

    fn update_by_id(&mut self, ns: &Namespace, id: &DocId, update: &Document) -> Result<bool> {
        (**self).update_by_id(ns, id, update)
    }

    fn delete_by_id(&mut self, ns: &Namespace, id: &DocId) -> Result<bool> {
        (**self).delete_by_id(ns, id)
    }
}

/// Does `update` use operators, rather than being a replacement document?
pub fn is_diff_update(update: &Document) -> bool {
    update.keys().any(|k| k.starts_with('$'))
}
