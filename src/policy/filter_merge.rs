use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::args::CallArgs;
use crate::backend::ScopedArgument;
use crate::core::{Document, Result, ScopeError, Value, type_name};
use crate::proxy::{Method, OverrideFn, replace_arg};

/// Field a bare, non-document filter value is matched against.
pub const ID_FIELD: &str = "_id";

/// Field/value constraints every scoped operation must satisfy.
///
/// Fields are applied in key order of the underlying map, which is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredFilter(Document);

impl RequiredFilter {
    pub fn new(fields: Document) -> Self {
        Self(fields)
    }

    /// Accepts a JSON object; `null` means "no constraints".
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            Value::Null => Ok(Self::default()),
            other => Err(ScopeError::InvalidArgument(format!(
                "required filter must be a document, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    /// Folds the required fields into a caller filter.
    ///
    /// - `null` becomes a document of the required fields;
    /// - a document gains each required field it does not already name
    ///   (the caller's value wins on conflict);
    /// - any other value is taken as an `_id` and rebuilt into a document.
    pub fn merge(&self, filter: Value) -> Value {
        self.0
            .iter()
            .fold(filter, |filter, (field, value)| merge_field(filter, field, value))
    }

    /// Stage prepended to aggregation pipelines.
    ///
    /// Computed from an empty caller filter, so inside this stage the
    /// required values always apply.
    pub fn match_stage(&self) -> Value {
        let mut stage = Document::new();
        stage.insert("$match".to_string(), self.merge(Value::Object(Document::new())));
        Value::Object(stage)
    }

    pub fn merge_pipeline(&self, argname: &str, pipeline: Value) -> Result<Value> {
        match pipeline {
            Value::Array(stages) => {
                let mut merged = Vec::with_capacity(stages.len() + 1);
                merged.push(self.match_stage());
                merged.extend(stages);
                Ok(Value::Array(merged))
            }
            _ => Err(ScopeError::InvalidPipelineArgument(argname.to_string())),
        }
    }
}

impl From<Document> for RequiredFilter {
    fn from(fields: Document) -> Self {
        Self(fields)
    }
}

fn merge_field(filter: Value, field: &str, value: &Value) -> Value {
    match filter {
        Value::Null => {
            let mut merged = Document::new();
            merged.insert(field.to_string(), value.clone());
            Value::Object(merged)
        }
        Value::Object(mut merged) => {
            if !merged.contains_key(field) {
                merged.insert(field.to_string(), value.clone());
            }
            Value::Object(merged)
        }
        id => {
            let mut merged = Document::new();
            merged.insert(ID_FIELD.to_string(), id);
            merge_field(Value::Object(merged), field, value)
        }
    }
}

/// Rewrites the scoped argument of an operation against a [`RequiredFilter`].
#[derive(Debug, Clone)]
pub struct FilterMergePolicy {
    required: Arc<RequiredFilter>,
}

impl FilterMergePolicy {
    pub fn new(required: Arc<RequiredFilter>) -> Self {
        Self { required }
    }

    pub fn required(&self) -> &Arc<RequiredFilter> {
        &self.required
    }

    /// Merges the filter held in `args[argname]`.
    pub fn update_filter(&self, argname: &str, mut args: CallArgs) -> Result<CallArgs> {
        let filter = args.take(argname);
        args.set(argname, self.required.merge(filter));
        Ok(args)
    }

    /// Prepends the `$match` stage to the pipeline held in `args[argname]`.
    pub fn modify_pipeline(&self, argname: &str, mut args: CallArgs) -> Result<CallArgs> {
        let pipeline = args.take(argname);
        args.set(argname, self.required.merge_pipeline(argname, pipeline)?);
        Ok(args)
    }

    /// Override that applies this policy to `argument` before forwarding.
    pub fn override_for<M: Method>(&self, argument: ScopedArgument) -> OverrideFn<M> {
        let policy = self.clone();
        match argument {
            ScopedArgument::Filter(name) => {
                replace_arg(name, move |arg: &str, args: CallArgs| policy.update_filter(arg, args))
            }
            ScopedArgument::Pipeline(name) => {
                replace_arg(name, move |arg: &str, args: CallArgs| policy.modify_pipeline(arg, args))
            }
        }
    }
}
