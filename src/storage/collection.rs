use std::sync::{Arc, RwLock};

use serde_json::json;
use tracing::debug;

use crate::args::CallArgs;
use crate::backend::{CollectionBackend, CollectionMethod};
use crate::core::{Document, Result, ScopeError, Value};
use crate::policy::ID_FIELD;
use crate::proxy::BaseObject;

use super::aggregate::{distinct_values, group, key_fields, run_pipeline};
use super::bulk::MemoryBulkOp;
use super::faults::FaultInjector;
use super::matcher::failure;
use super::query::{FindOptions, Projection, parse_sort};
use super::store::{DocumentStore, UpdateMode, UpdateOutcome, check_update};
use super::update::{UpdateKind, classify};

/// Handle to one in-memory collection. Clones share the same documents.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    database: String,
    store: Arc<RwLock<DocumentStore>>,
    faults: FaultInjector,
}

fn into_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(doc) => Ok(doc),
        other => Err(ScopeError::InvalidArgument(format!(
            "document must be an object, got {}",
            other
        ))),
    }
}

fn update_result(outcome: UpdateOutcome) -> Value {
    json!({
        "acknowledged": true,
        "matched_count": outcome.matched,
        "modified_count": outcome.modified,
        "upserted_id": outcome.upserted_id,
    })
}

impl MemoryCollection {
    pub(crate) fn new(
        name: impl Into<String>,
        database: impl Into<String>,
        store: Arc<RwLock<DocumentStore>>,
        faults: FaultInjector,
    ) -> Self {
        Self {
            name: name.into(),
            database: database.into(),
            store,
            faults,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.name)
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Seeds documents directly, bypassing fault injection.
    pub fn insert_documents(&self, documents: Vec<Value>) -> Result<Vec<Value>> {
        let mut store = self.store.write()?;
        documents
            .into_iter()
            .map(|doc| store.insert(into_document(doc)?))
            .collect()
    }

    /// Snapshot of every stored document, in insertion order.
    pub fn documents(&self) -> Result<Vec<Value>> {
        let store = self.store.read()?;
        Ok(store.documents().cloned().map(Value::Object).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.store.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn insert_document(&self, document: Value) -> Result<Value> {
        self.store.write()?.insert(into_document(document)?)
    }

    pub(crate) fn update_documents(&self, filter: &Value, update: &Value, mode: UpdateMode) -> Result<UpdateOutcome> {
        self.store.write()?.update(filter, update, mode)
    }

    pub(crate) fn delete_documents(&self, filter: &Value, multi: bool) -> Result<usize> {
        self.store.write()?.delete(filter, multi)
    }

    fn find(&self, args: &CallArgs, single: bool) -> Result<Value> {
        let projection = Projection::parse(args.value("projection"))?;
        let mut options = FindOptions::from_args(args)?;
        if single {
            options.limit = 1;
        }

        let found = self.store.read()?.find(args.value("filter"))?;
        let mut found = options.apply(found).into_iter().map(|doc| Value::Object(projection.apply(doc)));

        Ok(if single {
            found.next().unwrap_or(Value::Null)
        } else {
            Value::Array(found.collect())
        })
    }

    fn count(&self, args: &CallArgs) -> Result<Value> {
        let options = FindOptions::from_args(args)?;
        let found = self.store.read()?.find(args.value("filter"))?;
        Ok(Value::from(options.apply(found).len()))
    }

    fn insert(&self, args: &mut CallArgs) -> Result<Value> {
        match args.take("doc_or_docs") {
            Value::Array(documents) => {
                let continue_on_error = args.flag("continue_on_error");
                let mut store = self.store.write()?;
                let mut ids = Vec::with_capacity(documents.len());
                let mut first_error = None;
                for doc in documents {
                    match into_document(doc).and_then(|doc| store.insert(doc)) {
                        Ok(id) => ids.push(id),
                        Err(err) if continue_on_error => {
                            first_error.get_or_insert(err);
                        }
                        Err(err) => return Err(err),
                    }
                }
                match first_error {
                    Some(err) => Err(err),
                    None => Ok(Value::Array(ids)),
                }
            }
            doc => self.insert_document(doc),
        }
    }

    fn insert_many(&self, args: &mut CallArgs) -> Result<Value> {
        let Value::Array(documents) = args.take("documents") else {
            return Err(ScopeError::InvalidArgument("documents must be a non-empty list".to_string()));
        };
        if documents.is_empty() {
            return Err(ScopeError::InvalidArgument("documents must be a non-empty list".to_string()));
        }

        let ordered = args.flag("ordered");
        let mut store = self.store.write()?;
        let mut ids = Vec::with_capacity(documents.len());
        let mut first_error = None;
        for doc in documents {
            match into_document(doc).and_then(|doc| store.insert(doc)) {
                Ok(id) => ids.push(id),
                Err(err) if ordered => return Err(err),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(json!({"acknowledged": true, "inserted_ids": ids})),
        }
    }

    fn update(&self, args: &CallArgs, argname: &str, expect: UpdateKind, multi: bool) -> Result<Value> {
        let mode = UpdateMode {
            expect: Some(expect),
            upsert: args.flag("upsert"),
            multi,
        };
        let outcome = self.update_documents(args.value("filter"), args.value(argname), mode)?;
        Ok(update_result(outcome))
    }

    fn find_one_and_modify(&self, args: &CallArgs, argname: &str, expect: UpdateKind) -> Result<Value> {
        let filter = args.value("filter");
        let sort = parse_sort(args.value("sort"))?;
        let projection = Projection::parse(args.value("projection"))?;
        let update = check_update(
            args.value(argname),
            UpdateMode {
                expect: Some(expect),
                upsert: false,
                multi: false,
            },
        )?;
        let kind = classify(update)?;
        let return_after = args.flag("return_document");

        let mut store = self.store.write()?;
        let result = match store.first_match(filter, &sort)? {
            Some(row) => {
                let (before, after) = store.modify(row, update, kind)?;
                Some(if return_after { after } else { before })
            }
            None if args.flag("upsert") => {
                let mut doc = DocumentStore::upsert_document(filter, update, kind)?;
                let id = store.insert(doc.clone())?;
                doc.insert(ID_FIELD.to_string(), id);
                return_after.then_some(doc)
            }
            None => None,
        };

        Ok(result
            .map(|doc| Value::Object(projection.apply(doc)))
            .unwrap_or(Value::Null))
    }

    fn find_one_and_delete(&self, args: &CallArgs) -> Result<Value> {
        let sort = parse_sort(args.value("sort"))?;
        let projection = Projection::parse(args.value("projection"))?;

        let mut store = self.store.write()?;
        let removed = match store.first_match(args.value("filter"), &sort)? {
            Some(row) => store.remove(row),
            None => None,
        };
        Ok(removed
            .map(|doc| Value::Object(projection.apply(doc)))
            .unwrap_or(Value::Null))
    }

    fn legacy_update(&self, args: &CallArgs) -> Result<Value> {
        let mode = UpdateMode {
            expect: None,
            upsert: args.flag("upsert"),
            multi: args.flag("multi"),
        };
        let outcome = self.update_documents(args.value("spec"), args.value("document"), mode)?;

        let n = match outcome.upserted_id {
            Some(_) => 1,
            None => outcome.matched,
        };
        let mut reply = json!({
            "ok": 1,
            "n": n,
            "nModified": outcome.modified,
            "updatedExisting": outcome.matched > 0,
        });
        if let (Some(id), Value::Object(fields)) = (outcome.upserted_id, &mut reply) {
            fields.insert("upserted".to_string(), id);
        }
        Ok(reply)
    }

    fn legacy_group(&self, args: &CallArgs) -> Result<Value> {
        if !args.value("finalize").is_null() {
            return Err(failure("finalize functions are not supported by the in-memory store"));
        }
        let fields = key_fields(args.value("key"))?;
        let key_expr: Document = fields
            .iter()
            .map(|field| (field.clone(), Value::String(format!("${}", field))))
            .collect();
        let initial = match args.value("initial") {
            Value::Null => Document::new(),
            other => other
                .as_object()
                .cloned()
                .ok_or_else(|| ScopeError::InvalidArgument("initial must be a document".to_string()))?,
        };
        let reduce = args.object("reduce")?;

        let docs = self.store.read()?.find(args.value("condition"))?;
        let groups = group(&docs, &Value::Object(key_expr), reduce)?;

        Ok(Value::Array(
            groups
                .into_iter()
                .map(|group| {
                    let mut out = match group.key {
                        Value::Object(key) => key,
                        _ => Document::new(),
                    };
                    out.extend(initial.clone());
                    out.extend(group.fields);
                    Value::Object(out)
                })
                .collect(),
        ))
    }

    fn aggregate(&self, args: &CallArgs) -> Result<Value> {
        let Value::Array(pipeline) = args.value("pipeline") else {
            return Err(failure("pipeline must be a list"));
        };
        let docs = self.store.read()?.documents().cloned().collect();
        let out = run_pipeline(docs, pipeline)?;
        Ok(Value::Array(out.into_iter().map(Value::Object).collect()))
    }
}

impl BaseObject for MemoryCollection {
    type Method = CollectionMethod;

    fn kind(&self) -> &'static str {
        "Collection"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::String(self.name.clone())),
            "full_name" => Some(Value::String(self.full_name())),
            "database" => Some(Value::String(self.database.clone())),
            _ => None,
        }
    }

    fn call(&self, method: CollectionMethod, mut args: CallArgs) -> Result<Value> {
        self.faults.check(method.as_str())?;
        debug!(collection = %self.full_name(), method = method.as_str(), "memory collection call");

        use CollectionMethod::*;
        match method {
            Count => self.count(&args),
            Find => self.find(&args, false),
            FindOne => self.find(&args, true),
            Insert => self.insert(&mut args),
            InsertOne => {
                let id = self.insert_document(args.take("document"))?;
                Ok(json!({"acknowledged": true, "inserted_id": id}))
            }
            InsertMany => self.insert_many(&mut args),
            ReplaceOne => self.update(&args, "replacement", UpdateKind::Replacement, false),
            UpdateOne => self.update(&args, "update", UpdateKind::Operators, false),
            UpdateMany => self.update(&args, "update", UpdateKind::Operators, true),
            DeleteOne | DeleteMany => {
                let deleted = self.delete_documents(args.value("filter"), method == DeleteMany)?;
                Ok(json!({"acknowledged": true, "deleted_count": deleted}))
            }
            FindOneAndDelete => self.find_one_and_delete(&args),
            FindOneAndReplace => self.find_one_and_modify(&args, "replacement", UpdateKind::Replacement),
            FindOneAndUpdate => self.find_one_and_modify(&args, "update", UpdateKind::Operators),
            Distinct => {
                let key = args.str("key")?;
                let docs = self.store.read()?.find(args.value("filter"))?;
                Ok(Value::Array(distinct_values(&docs, key)))
            }
            Update => self.legacy_update(&args),
            Remove => {
                let removed = self.delete_documents(args.value("spec_or_id"), args.flag("multi"))?;
                Ok(json!({"ok": 1, "n": removed}))
            }
            Aggregate => self.aggregate(&args),
            Group => self.legacy_group(&args),
        }
    }
}

impl CollectionBackend for MemoryCollection {
    type Bulk = MemoryBulkOp;

    fn initialize_ordered_bulk_op(&self, bypass_document_validation: bool) -> Result<MemoryBulkOp> {
        self.faults.check("initialize_ordered_bulk_op")?;
        Ok(MemoryBulkOp::new(self.clone(), true, bypass_document_validation))
    }

    fn initialize_unordered_bulk_op(&self, bypass_document_validation: bool) -> Result<MemoryBulkOp> {
        self.faults.check("initialize_unordered_bulk_op")?;
        Ok(MemoryBulkOp::new(self.clone(), false, bypass_document_validation))
    }
}
