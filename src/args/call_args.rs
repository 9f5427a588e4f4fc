use crate::core::{Document, Result, ScopeError, Value, is_truthy};

static NULL: Value = Value::Null;

/// Name-keyed view of one normalized invocation.
///
/// Built fresh for every call; the key set is exactly the target's declared
/// parameter names plus any flattened catch-all keywords.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs(Document);

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(values: Document) -> Self {
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Value of `name`, treating a missing entry as `null`.
    pub fn value(&self, name: &str) -> &Value {
        self.0.get(name).unwrap_or(&NULL)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Removes and returns `name`, or `null` when it was never bound.
    pub fn take(&mut self, name: &str) -> Value {
        self.0.remove(name).unwrap_or(Value::Null)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    pub fn flag(&self, name: &str) -> bool {
        is_truthy(self.value(name))
    }

    /// Non-negative integer argument; `null` yields `default`.
    pub fn count_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.value(name) {
            Value::Null => Ok(default),
            Value::Number(n) => n
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| ScopeError::InvalidArgument(format!("'{}' must be a non-negative integer", name))),
            other => Err(ScopeError::InvalidArgument(format!(
                "'{}' must be a non-negative integer, got {}",
                name, other
            ))),
        }
    }

    pub fn str(&self, name: &str) -> Result<&str> {
        self.value(name)
            .as_str()
            .ok_or_else(|| ScopeError::InvalidArgument(format!("'{}' must be a string", name)))
    }

    pub fn object(&self, name: &str) -> Result<&Document> {
        self.value(name)
            .as_object()
            .ok_or_else(|| ScopeError::InvalidArgument(format!("'{}' must be a document", name)))
    }
}

impl From<Document> for CallArgs {
    fn from(values: Document) -> Self {
        Self(values)
    }
}

impl IntoIterator for CallArgs {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
