use crate::core::{Document, Result, ScopeError, Value};

use super::{CallArgs, Invocation};

/// One declared parameter; `default: None` means the caller must supply it.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
}

/// Declared parameter list of a callable member.
///
/// Built once per operation and reused for every call. An optional leading
/// receiver (`self`) is bound implicitly and never appears in the output; an
/// optional trailing catch-all collects undeclared keywords, which are then
/// flattened into the top level of the normalized mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    name: String,
    receiver: Option<String>,
    params: Vec<Param>,
    catch_all: Option<String>,
}

impl Signature {
    /// Signature of a free function
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            receiver: None,
            params: Vec::new(),
            catch_all: None,
        }
    }

    /// Signature of a method with an implicit `self` receiver
    pub fn method(name: impl Into<String>) -> Self {
        Self {
            receiver: Some("self".to_string()),
            ..Self::new(name)
        }
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    /// Accept arbitrary extra keywords under `name` (e.g. `kwargs`)
    pub fn catch_all(mut self, name: impl Into<String>) -> Self {
        self.catch_all = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn has_catch_all(&self) -> bool {
        self.catch_all.is_some()
    }

    pub fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|p| p.name == name)
    }

    /// Binds `invocation` against this signature.
    ///
    /// Positional values fill declared names left to right, then keywords,
    /// then defaults. Extra keywords land in the catch-all and are flattened.
    pub fn normalize(&self, invocation: Invocation) -> Result<CallArgs> {
        let (positional, keywords) = invocation.into_parts();

        if positional.len() > self.params.len() {
            return Err(ScopeError::arity(
                &self.name,
                format!(
                    "takes {} positional argument(s) but {} were given",
                    self.params.len(),
                    positional.len()
                ),
            ));
        }

        let mut bound = Document::new();
        for (param, value) in self.params.iter().zip(positional) {
            bound.insert(param.name.clone(), value);
        }

        let mut extras = Document::new();
        for (key, value) in keywords {
            if self.receiver.as_deref() == Some(key.as_str()) {
                return Err(ScopeError::arity(
                    &self.name,
                    format!("got multiple values for argument '{}'", key),
                ));
            }

            if self.declares(&key) {
                if bound.contains_key(&key) {
                    return Err(ScopeError::arity(
                        &self.name,
                        format!("got multiple values for argument '{}'", key),
                    ));
                }
                bound.insert(key, value);
            } else if self.catch_all.is_some() {
                extras.insert(key, value);
            } else {
                return Err(ScopeError::arity(
                    &self.name,
                    format!("got an unexpected keyword argument '{}'", key),
                ));
            }
        }

        let mut missing = Vec::new();
        for param in &self.params {
            if bound.contains_key(&param.name) {
                continue;
            }
            match &param.default {
                Some(default) => {
                    bound.insert(param.name.clone(), default.clone());
                }
                None => missing.push(format!("'{}'", param.name)),
            }
        }

        if !missing.is_empty() {
            return Err(ScopeError::arity(
                &self.name,
                format!("missing required argument(s): {}", missing.join(", ")),
            ));
        }

        bound.extend(extras);
        Ok(CallArgs::from_document(bound))
    }
}
