use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::debug;

use crate::args::CallArgs;
use crate::backend::{BulkBackend, BulkMethod, SelectorMethod};
use crate::core::{Result, ScopeError, Value};
use crate::proxy::BaseObject;

use super::collection::MemoryCollection;
use super::faults::FaultInjector;
use super::matcher::failure;
use super::store::{UpdateMode, check_update};
use super::update::UpdateKind;

#[derive(Debug, Clone, PartialEq)]
enum BulkOp {
    Insert(Value),
    Update { selector: Value, update: Value, multi: bool },
    Replace { selector: Value, replacement: Value },
    Remove { selector: Value, multi: bool },
}

#[derive(Debug, Default)]
struct BulkState {
    ops: Vec<BulkOp>,
    executed: bool,
}

impl BulkState {
    fn queue(&mut self, op: BulkOp) -> Result<()> {
        if self.executed {
            return Err(failure("Bulk operations can only be executed once"));
        }
        self.ops.push(op);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BulkCounts {
    inserted: usize,
    matched: usize,
    modified: usize,
    removed: usize,
    upserted: usize,
}

impl BulkCounts {
    fn to_value(&self) -> Value {
        json!({
            "nInserted": self.inserted,
            "nMatched": self.matched,
            "nModified": self.modified,
            "nRemoved": self.removed,
            "nUpserted": self.upserted,
        })
    }
}

fn operators_only(multi: bool) -> UpdateMode {
    UpdateMode {
        expect: Some(UpdateKind::Operators),
        upsert: false,
        multi,
    }
}

const REPLACEMENT: UpdateMode = UpdateMode {
    expect: Some(UpdateKind::Replacement),
    upsert: false,
    multi: false,
};

/// Bulk-operation builder over a [`MemoryCollection`].
///
/// Operations are queued and applied in order on `execute`. An ordered
/// builder stops at the first failing operation; an unordered one applies
/// the rest and reports the first failure afterwards.
#[derive(Debug, Clone)]
pub struct MemoryBulkOp {
    collection: MemoryCollection,
    ordered: bool,
    bypass_document_validation: bool,
    state: Arc<Mutex<BulkState>>,
}

impl MemoryBulkOp {
    pub(crate) fn new(collection: MemoryCollection, ordered: bool, bypass_document_validation: bool) -> Self {
        Self {
            collection,
            ordered,
            bypass_document_validation,
            state: Arc::new(Mutex::new(BulkState::default())),
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Operations queued and not yet executed
    pub fn pending(&self) -> Result<usize> {
        Ok(self.state.lock()?.ops.len())
    }

    fn apply(&self, op: BulkOp, counts: &mut BulkCounts) -> Result<()> {
        match op {
            BulkOp::Insert(document) => {
                self.collection.insert_document(document)?;
                counts.inserted += 1;
            }
            BulkOp::Update { selector, update, multi } => {
                let outcome = self
                    .collection
                    .update_documents(&selector, &update, operators_only(multi))?;
                counts.matched += outcome.matched;
                counts.modified += outcome.modified;
                counts.upserted += usize::from(outcome.upserted_id.is_some());
            }
            BulkOp::Replace { selector, replacement } => {
                let outcome = self.collection.update_documents(&selector, &replacement, REPLACEMENT)?;
                counts.matched += outcome.matched;
                counts.modified += outcome.modified;
            }
            BulkOp::Remove { selector, multi } => {
                counts.removed += self.collection.delete_documents(&selector, multi)?;
            }
        }
        Ok(())
    }

    fn execute(&self) -> Result<Value> {
        let ops = {
            let mut state = self.state.lock()?;
            if state.executed {
                return Err(failure("Bulk operations can only be executed once"));
            }
            if state.ops.is_empty() {
                return Err(ScopeError::InvalidArgument("No operations to execute".to_string()));
            }
            state.executed = true;
            std::mem::take(&mut state.ops)
        };
        debug!(
            collection = %self.collection.full_name(),
            ops = ops.len(),
            ordered = self.ordered,
            "executing bulk operations"
        );

        let mut counts = BulkCounts::default();
        let mut first_error = None;
        for op in ops {
            if let Err(err) = self.apply(op, &mut counts) {
                if self.ordered {
                    return Err(err);
                }
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(counts.to_value()),
        }
    }
}

impl BaseObject for MemoryBulkOp {
    type Method = BulkMethod;

    fn kind(&self) -> &'static str {
        "BulkOperationBuilder"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "ordered" => Some(Value::Bool(self.ordered)),
            "bypass_document_validation" => Some(Value::Bool(self.bypass_document_validation)),
            "collection" => Some(Value::String(self.collection.full_name())),
            _ => None,
        }
    }

    fn call(&self, method: BulkMethod, mut args: CallArgs) -> Result<Value> {
        self.collection.faults().check(method.as_str())?;
        match method {
            BulkMethod::Insert => {
                let document = args.take("document");
                if !document.is_object() {
                    return Err(ScopeError::InvalidArgument(format!(
                        "document must be an object, got {}",
                        document
                    )));
                }
                self.state.lock()?.queue(BulkOp::Insert(document))?;
                Ok(Value::Null)
            }
            BulkMethod::Execute => self.execute(),
        }
    }
}

impl BulkBackend for MemoryBulkOp {
    type Selector = MemorySelector;

    fn find(&self, selector: Value) -> Result<MemorySelector> {
        self.collection.faults().check("find")?;
        Ok(MemorySelector {
            selector,
            state: Arc::clone(&self.state),
            faults: self.collection.faults().clone(),
        })
    }
}

/// Selector-scoped sub-builder; every call queues one operation on the
/// parent builder.
#[derive(Debug, Clone)]
pub struct MemorySelector {
    selector: Value,
    state: Arc<Mutex<BulkState>>,
    faults: FaultInjector,
}

impl MemorySelector {
    pub fn selector(&self) -> &Value {
        &self.selector
    }
}

impl BaseObject for MemorySelector {
    type Method = SelectorMethod;

    fn kind(&self) -> &'static str {
        "BulkWriteOperation"
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "selector" => Some(self.selector.clone()),
            _ => None,
        }
    }

    fn call(&self, method: SelectorMethod, mut args: CallArgs) -> Result<Value> {
        self.faults.check(method.as_str())?;
        let selector = self.selector.clone();

        let op = match method {
            SelectorMethod::Update | SelectorMethod::UpdateOne => {
                let multi = method == SelectorMethod::Update;
                let update = args.take("update");
                check_update(&update, operators_only(multi))?;
                BulkOp::Update { selector, update, multi }
            }
            SelectorMethod::ReplaceOne => {
                let replacement = args.take("replacement");
                check_update(&replacement, REPLACEMENT)?;
                BulkOp::Replace { selector, replacement }
            }
            SelectorMethod::Remove => BulkOp::Remove { selector, multi: true },
            SelectorMethod::RemoveOne => BulkOp::Remove { selector, multi: false },
        };

        self.state.lock()?.queue(op)?;
        Ok(Value::Null)
    }
}
