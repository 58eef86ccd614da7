//! In memory replay target, used by dry runs.

use bson::{Bson, Document};
use std::collections::{BTreeMap, HashMap};

use super::store::{is_diff_update, Store};
use crate::error::{ReplayError, Result};
use crate::operation::{DocId, Namespace};
use crate::ID_KEY;

const SET_OPERATOR: &str = "$set";
const UNSET_OPERATOR: &str = "$unset";
/// mongodb refuses to pad an array by more than this many elements.
const MAX_ARRAY_PADDING: usize = 1_500_000;

/// Documents per namespace, keyed by canonical string id.
///
/// It understands the same update forms a replay can contain: full replacement, and
/// `$set`/`$unset` with dotted paths and array indexes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryStore {
    colls: HashMap<Namespace, BTreeMap<String, Document>>,
}

impl MemoryStore {
    /// create an empty store.
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// get document `id` in `ns`.
    pub fn get(&self, ns: &Namespace, id: &str) -> Option<&Document> {
        self.colls.get(ns).and_then(|coll| coll.get(id))
    }

    /// number of documents in `ns`.
    pub fn count(&self, ns: &Namespace) -> usize {
        self.colls.get(ns).map_or(0, |coll| coll.len())
    }

    /// number of documents in all namespaces.
    pub fn total_count(&self) -> usize {
        self.colls.values().map(|coll| coll.len()).sum()
    }

    fn rejected(ns: &Namespace, id: &DocId, detail: String) -> ReplayError {
        ReplayError::StoreRejected {
            ns: ns.to_string(),
            id: id.to_string(),
            detail,
        }
    }
}

impl Store for MemoryStore {
    fn upsert_by_id(&mut self, ns: &Namespace, id: &DocId, doc: &Document) -> Result<()> {
        self.colls
            .entry(ns.clone())
            .or_default()
            .insert(id.to_string(), with_id(id, doc));
        Ok(())
    }

    fn update_by_id(&mut self, ns: &Namespace, id: &DocId, update: &Document) -> Result<bool> {
        let target = match self
            .colls
            .get_mut(ns)
            .and_then(|coll| coll.get_mut(&id.to_string()))
        {
            Some(doc) => doc,
            None => return Ok(false),
        };

        if !is_diff_update(update) {
            if let Some(new_id) = update.get(ID_KEY) {
                if *new_id != id.to_bson() {
                    return Err(Self::rejected(
                        ns,
                        id,
                        format!("the _id field cannot be changed to {}", new_id),
                    ));
                }
            }
            *target = with_id(id, update);
            return Ok(true);
        }

        // work on a copy, a failed update must leave the document untouched.
        let mut updated = target.clone();
        for (operator, fields) in update {
            let fields = match fields {
                Bson::Document(fields) => fields,
                other => {
                    return Err(Self::rejected(
                        ns,
                        id,
                        format!("{} expects a document, get {:?}", operator, other.element_type()),
                    ))
                }
            };
            for (path, value) in fields {
                if path == ID_KEY || path.starts_with("_id.") {
                    return Err(Self::rejected(
                        ns,
                        id,
                        format!("{} would modify the immutable field '_id'", operator),
                    ));
                }
                match operator.as_str() {
                    SET_OPERATOR => set_in_document(&mut updated, path, value.clone())
                        .map_err(|detail| Self::rejected(ns, id, detail))?,
                    UNSET_OPERATOR => unset_in_document(&mut updated, path),
                    other => {
                        return Err(Self::rejected(
                            ns,
                            id,
                            format!("unsupported update operator {}", other),
                        ))
                    }
                }
            }
        }
        *target = updated;
        Ok(true)
    }

    fn delete_by_id(&mut self, ns: &Namespace, id: &DocId) -> Result<bool> {
        Ok(self
            .colls
            .get_mut(ns)
            .and_then(|coll| coll.remove(&id.to_string()))
            .is_some())
    }
}

/// `doc` with `_id` as its first field, the way mongodb stores it.
fn with_id(id: &DocId, doc: &Document) -> Document {
    let mut result = Document::new();
    result.insert(ID_KEY, id.to_bson());
    for (k, v) in doc {
        if k != ID_KEY {
            result.insert(k.clone(), v.clone());
        }
    }
    result
}

fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}

fn set_in_document(doc: &mut Document, path: &str, value: Bson) -> std::result::Result<(), String> {
    match split_path(path) {
        (head, None) => {
            doc.insert(head, value);
            Ok(())
        }
        (head, Some(rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            set_in_value(child, rest, value)
        }
    }
}

fn set_in_value(target: &mut Bson, path: &str, value: Bson) -> std::result::Result<(), String> {
    match target {
        Bson::Document(doc) => set_in_document(doc, path, value),
        Bson::Array(items) => {
            let (head, rest) = split_path(path);
            let idx: usize = head
                .parse()
                .map_err(|_| format!("cannot use the part ({}) to traverse an array", head))?;
            if items.len() <= idx {
                let new_len = idx
                    .checked_add(1)
                    .filter(|len| len - items.len() <= MAX_ARRAY_PADDING)
                    .ok_or_else(|| {
                        format!(
                            "can't pad array of {} elements up to index {}",
                            items.len(),
                            idx
                        )
                    })?;
                items.resize(new_len, Bson::Null);
            }
            match rest {
                None => {
                    items[idx] = value;
                    Ok(())
                }
                Some(rest) => {
                    if items[idx] == Bson::Null {
                        items[idx] = Bson::Document(Document::new());
                    }
                    set_in_value(&mut items[idx], rest, value)
                }
            }
        }
        other => Err(format!(
            "cannot create field ({}) in element of type {:?}",
            path,
            other.element_type()
        )),
    }
}

fn unset_in_document(doc: &mut Document, path: &str) {
    match split_path(path) {
        (head, None) => {
            doc.remove(head);
        }
        (head, Some(rest)) => {
            if let Some(child) = doc.get_mut(head) {
                unset_in_value(child, rest);
            }
        }
    }
}

fn unset_in_value(target: &mut Bson, path: &str) {
    match target {
        Bson::Document(doc) => unset_in_document(doc, path),
        Bson::Array(items) => {
            let (head, rest) = split_path(path);
            let item = match head.parse::<usize>().ok().and_then(|idx| items.get_mut(idx)) {
                Some(item) => item,
                None => return,
            };
            // unset keeps array positions, the element becomes null.
            match rest {
                None => *item = Bson::Null,
                Some(rest) => unset_in_value(item, rest),
            }
        }
        _ => {}
    }
}
