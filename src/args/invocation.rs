use crate::core::{Document, Value, is_truthy};

use super::CallArgs;

/// Reserved keyword that switches off every interception layer for one call.
pub const ESCAPE_KEYWORD: &str = "no_intercept";

/// A call as the caller wrote it: positional values followed by keywords.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    positional: Vec<Value>,
    keywords: Document,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_args(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Document::new(),
        }
    }

    pub fn from_keywords(keywords: Document) -> Self {
        Self {
            positional: Vec::new(),
            keywords,
        }
    }

    /// Append a positional value
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword value
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    /// Mark this call as escaping all interception
    pub fn escaped(self) -> Self {
        self.kwarg(ESCAPE_KEYWORD, true)
    }

    pub fn is_escaped(&self) -> bool {
        self.keywords.get(ESCAPE_KEYWORD).is_some_and(is_truthy)
    }

    /// Strips the escape keyword and reports whether it was set.
    ///
    /// The keyword is removed even when it is present but falsy, so it never
    /// reaches the base object.
    pub fn take_escape(&mut self) -> bool {
        self.keywords
            .remove(ESCAPE_KEYWORD)
            .is_some_and(|flag| is_truthy(&flag))
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &Document {
        &self.keywords
    }

    pub fn into_parts(self) -> (Vec<Value>, Document) {
        (self.positional, self.keywords)
    }
}

impl From<CallArgs> for Invocation {
    fn from(args: CallArgs) -> Self {
        Self::from_keywords(args.into_document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_flag_is_stripped() {
        let mut inv = Invocation::new().arg(12).escaped();
        assert!(inv.is_escaped());
        assert!(inv.take_escape());
        assert!(!inv.is_escaped());
        assert!(!inv.keywords().contains_key(ESCAPE_KEYWORD));
        assert_eq!(inv.positional(), &[json!(12)]);
    }

    #[test]
    fn test_falsy_escape_flag_is_removed_but_ignored() {
        let mut inv = Invocation::new().kwarg(ESCAPE_KEYWORD, false);
        assert!(!inv.take_escape());
        assert!(inv.keywords().is_empty());
    }
}
