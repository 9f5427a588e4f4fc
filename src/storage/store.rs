use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::core::{Document, Result, ScopeError, TransportError, Value};
use crate::policy::ID_FIELD;

use super::matcher::{failure, matches};
use super::query::{SortKey, compare_documents};
use super::update::{UpdateKind, apply_operators, classify, replace, seed_from_filter};

/// Outcome of an update, replacement or upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched: usize,
    pub modified: usize,
    pub upserted_id: Option<Value>,
}

/// How an update argument is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateMode {
    /// Required shape of the update document, if the operation insists on one
    pub expect: Option<UpdateKind>,
    pub upsert: bool,
    pub multi: bool,
}

/// Documents of one collection, in insertion order, with a unique `_id` index.
#[derive(Debug, Default)]
pub struct DocumentStore {
    rows: BTreeMap<usize, Document>,
    next_row_id: usize,
    ids: HashMap<String, usize>,
}

fn id_key(id: &Value) -> String {
    id.to_string()
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.rows.values()
    }

    pub fn get(&self, row: usize) -> Option<&Document> {
        self.rows.get(&row)
    }

    /// Stores `doc`, generating a string `_id` when it has none.
    pub fn insert(&mut self, mut doc: Document) -> Result<Value> {
        let id = doc
            .entry(ID_FIELD)
            .or_insert_with(|| Value::String(Uuid::new_v4().simple().to_string()))
            .clone();

        let key = id_key(&id);
        if self.ids.contains_key(&key) {
            return Err(TransportError::DuplicateKey(format!("E11000 duplicate key error: {{ _id: {} }}", id)).into());
        }

        let row = self.next_row_id;
        self.next_row_id += 1;
        self.rows.insert(row, doc);
        self.ids.insert(key, row);
        Ok(id)
    }

    /// Row ids of every matching document, in insertion order.
    pub fn scan(&self, filter: &Value) -> Result<Vec<usize>> {
        let mut found = Vec::new();
        for (row, doc) in &self.rows {
            if matches(doc, filter)? {
                found.push(*row);
            }
        }
        Ok(found)
    }

    /// Matching documents, cloned, in insertion order.
    pub fn find(&self, filter: &Value) -> Result<Vec<Document>> {
        let mut found = Vec::new();
        for doc in self.rows.values() {
            if matches(doc, filter)? {
                found.push(doc.clone());
            }
        }
        Ok(found)
    }

    /// First match under `sort` (insertion order when `sort` is empty).
    pub fn first_match(&self, filter: &Value, sort: &[SortKey]) -> Result<Option<usize>> {
        let rows = self.scan(filter)?;
        Ok(rows.into_iter().min_by(|a, b| match (self.rows.get(a), self.rows.get(b)) {
            (Some(a), Some(b)) => compare_documents(a, b, sort),
            _ => a.cmp(b),
        }))
    }

    pub fn remove(&mut self, row: usize) -> Option<Document> {
        let doc = self.rows.remove(&row)?;
        if let Some(id) = doc.get(ID_FIELD) {
            self.ids.remove(&id_key(id));
        }
        Some(doc)
    }

    pub fn delete(&mut self, filter: &Value, multi: bool) -> Result<usize> {
        let mut rows = self.scan(filter)?;
        if !multi {
            rows.truncate(1);
        }
        Ok(rows.into_iter().filter_map(|row| self.remove(row)).count())
    }

    /// Applies `update` to one stored row; returns the documents before and after.
    pub fn modify(&mut self, row: usize, update: &Document, kind: UpdateKind) -> Result<(Document, Document)> {
        let before = self
            .rows
            .get(&row)
            .cloned()
            .ok_or_else(|| ScopeError::InvalidArgument(format!("row {} vanished during update", row)))?;

        let after = match kind {
            UpdateKind::Operators => {
                let mut after = before.clone();
                apply_operators(&mut after, update, false)?;
                after
            }
            UpdateKind::Replacement => replace(&before, update)?,
        };
        if before.get(ID_FIELD) != after.get(ID_FIELD) {
            return Err(failure(format!(
                "Performing an update on the path '{}' would modify the immutable field '{}'",
                ID_FIELD, ID_FIELD
            )));
        }

        self.rows.insert(row, after.clone());
        Ok((before, after))
    }

    /// Document inserted by an upsert that matched nothing.
    pub fn upsert_document(filter: &Value, update: &Document, kind: UpdateKind) -> Result<Document> {
        let seed = seed_from_filter(filter);
        match kind {
            UpdateKind::Operators => {
                let mut doc = seed;
                apply_operators(&mut doc, update, true)?;
                Ok(doc)
            }
            UpdateKind::Replacement => {
                let mut doc = update.clone();
                if !doc.contains_key(ID_FIELD)
                    && let Some(id) = seed.get(ID_FIELD)
                {
                    doc.insert(ID_FIELD.to_string(), id.clone());
                }
                Ok(doc)
            }
        }
    }

    pub fn update(&mut self, filter: &Value, update: &Value, mode: UpdateMode) -> Result<UpdateOutcome> {
        let update = check_update(update, mode)?;
        let kind = classify(update)?;

        let mut rows = self.scan(filter)?;
        if !mode.multi {
            rows.truncate(1);
        }

        if rows.is_empty() {
            if !mode.upsert {
                return Ok(UpdateOutcome::default());
            }
            let doc = Self::upsert_document(filter, update, kind)?;
            let id = self.insert(doc)?;
            return Ok(UpdateOutcome {
                matched: 0,
                modified: 0,
                upserted_id: Some(id),
            });
        }

        let mut outcome = UpdateOutcome {
            matched: rows.len(),
            ..UpdateOutcome::default()
        };
        for row in rows {
            let (before, after) = self.modify(row, update, kind)?;
            if before != after {
                outcome.modified += 1;
            }
        }
        Ok(outcome)
    }
}

/// Validates an update argument against what the operation accepts.
pub fn check_update(update: &Value, mode: UpdateMode) -> Result<&Document> {
    let Value::Object(update) = update else {
        return Err(ScopeError::InvalidArgument(format!("update must be a document, got {}", update)));
    };
    let kind = classify(update)?;
    match (mode.expect, kind) {
        (Some(UpdateKind::Operators), UpdateKind::Replacement) => {
            Err(ScopeError::InvalidArgument("update only works with $ operators".to_string()))
        }
        (Some(UpdateKind::Replacement), UpdateKind::Operators) => {
            Err(ScopeError::InvalidArgument("replacement can not include $ operators".to_string()))
        }
        (_, UpdateKind::Replacement) if mode.multi => {
            Err(failure("multi update only works with $ operators"))
        }
        _ => Ok(update),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn store() -> DocumentStore {
        let mut store = DocumentStore::new();
        for value in [
            json!({"_id": 1, "name": "foobar", "val": 420}),
            json!({"_id": 2, "name": "foobar", "val": 123}),
            json!({"_id": 3, "name": "foobaz", "val": 840}),
        ] {
            store.insert(doc(value)).unwrap();
        }
        store
    }

    const MANY: UpdateMode = UpdateMode {
        expect: Some(UpdateKind::Operators),
        upsert: false,
        multi: true,
    };

    #[test]
    fn test_insert_generates_ids_and_rejects_duplicates() {
        let mut store = store();
        let id = store.insert(doc(json!({"name": "new"}))).unwrap();
        assert!(id.is_string());
        assert_eq!(store.len(), 4);

        let err = store.insert(doc(json!({"_id": 1}))).unwrap_err();
        assert!(matches!(err, ScopeError::Transport(TransportError::DuplicateKey(_))));
    }

    #[test]
    fn test_update_many_counts_matched_and_modified() {
        let mut store = store();
        let outcome = store
            .update(&json!({"name": "foobar"}), &json!({"$set": {"val": 420}}), MANY)
            .unwrap();
        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.modified, 1);
    }

    #[test]
    fn test_upsert_seeds_from_filter() {
        let mut store = store();
        let mode = UpdateMode {
            upsert: true,
            multi: false,
            ..MANY
        };
        let outcome = store
            .update(&json!({"name": "fresh"}), &json!({"$inc": {"val": 1}}), mode)
            .unwrap();
        let id = outcome.upserted_id.unwrap();

        let found = store.find(&json!({"_id": id})).unwrap();
        assert_eq!(found[0].get("name"), Some(&json!("fresh")));
        assert_eq!(found[0].get("val"), Some(&json!(1)));
    }

    #[test]
    fn test_id_is_immutable() {
        let mut store = store();
        let err = store
            .update(&json!({"_id": 1}), &json!({"$set": {"_id": 9}}), MANY)
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_first_match_and_delete() {
        let mut store = store();
        let row = store.first_match(&json!({"name": "foobar"}), &[SortKey {
            path: "val".to_string(),
            descending: false,
        }]);
        let row = row.unwrap().unwrap();
        assert_eq!(store.get(row).and_then(|d| d.get("val")), Some(&json!(123)));

        assert_eq!(store.delete(&json!({"name": "foobar"}), false).unwrap(), 1);
        assert_eq!(store.delete(&Value::Null, true).unwrap(), 2);
        assert!(store.is_empty());
        // the _id index is cleared with the rows
        store.insert(doc(json!({"_id": 1}))).unwrap();
    }
}
