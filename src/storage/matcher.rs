//! Query document matching

use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use lru::LruCache;
use regex::{Regex, RegexBuilder};

use crate::core::{Document, Result, TransportError, Value, compare_values, get_path, is_truthy, values_equal};
use crate::policy::ID_FIELD;

const REGEX_CACHE_SIZE: usize = 200;

lazy_static! {
    static ref REGEX_LRU_CACHE: Mutex<LruCache<String, Arc<Regex>>> =
        Mutex::new(LruCache::new(NonZeroUsize::new(REGEX_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN)));
}

pub(crate) fn failure(message: impl Into<String>) -> crate::core::ScopeError {
    TransportError::OperationFailure(message.into()).into()
}

/// Tests `doc` against a filter.
///
/// `null` matches everything, a document is a query, and any other value is
/// shorthand for `_id` equality.
pub fn matches(doc: &Document, filter: &Value) -> Result<bool> {
    match filter {
        Value::Null => Ok(true),
        Value::Object(query) => matches_query(doc, query),
        id => Ok(doc.get(ID_FIELD).is_some_and(|value| values_equal(value, id))),
    }
}

pub fn matches_query(doc: &Document, query: &Document) -> Result<bool> {
    for (key, condition) in query {
        let ok = match key.as_str() {
            "$and" => all_of(doc, key, condition)?,
            "$or" => any_of(doc, key, condition)?,
            "$nor" => !any_of(doc, key, condition)?,
            op if op.starts_with('$') => {
                return Err(failure(format!("unknown top level operator: {}", op)));
            }
            path => matches_condition(get_path(doc, path), condition)?,
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn clauses<'a>(operator: &str, condition: &'a Value) -> Result<&'a [Value]> {
    match condition {
        Value::Array(items) if !items.is_empty() => Ok(items),
        _ => Err(failure(format!("{} must be a nonempty array", operator))),
    }
}

fn all_of(doc: &Document, operator: &str, condition: &Value) -> Result<bool> {
    for clause in clauses(operator, condition)? {
        if !matches(doc, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn any_of(doc: &Document, operator: &str, condition: &Value) -> Result<bool> {
    for clause in clauses(operator, condition)? {
        if matches(doc, clause)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_operator_document(condition: &Value) -> Option<&Document> {
    match condition {
        Value::Object(map) if !map.is_empty() && map.keys().all(|key| key.starts_with('$')) => Some(map),
        _ => None,
    }
}

fn matches_condition(value: Option<&Value>, condition: &Value) -> Result<bool> {
    let Some(operators) = is_operator_document(condition) else {
        return Ok(equals(value, condition));
    };

    for (op, operand) in operators {
        let ok = match op.as_str() {
            "$eq" => equals(value, operand),
            "$ne" => !equals(value, operand),
            "$gt" => compares(value, operand, |ord| ord == Ordering::Greater),
            "$gte" => compares(value, operand, |ord| ord != Ordering::Less),
            "$lt" => compares(value, operand, |ord| ord == Ordering::Less),
            "$lte" => compares(value, operand, |ord| ord != Ordering::Greater),
            "$in" => is_in(value, op, operand)?,
            "$nin" => !is_in(value, op, operand)?,
            "$exists" => is_truthy(operand) == value.is_some(),
            "$regex" => {
                let flags = operators.get("$options").and_then(Value::as_str).unwrap_or("");
                regex_matches(value, operand, flags)?
            }
            "$options" => {
                if !operators.contains_key("$regex") {
                    return Err(failure("$options needs a $regex"));
                }
                true
            }
            "$not" => !matches_condition(value, operand)?,
            other => return Err(failure(format!("unknown operator: {}", other))),
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality with array-contains semantics; `null` also matches a missing field.
fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(value) if values_equal(value, expected) => true,
        Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, expected)),
        Some(_) => false,
    }
}

fn compares(value: Option<&Value>, operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    let test = |candidate: &Value| compare_values(candidate, operand).is_some_and(&accept);
    match value {
        Value::Array(items) => test(value) || items.iter().any(test),
        _ => test(value),
    }
}

fn is_in(value: Option<&Value>, operator: &str, operand: &Value) -> Result<bool> {
    match operand {
        Value::Array(options) => Ok(options.iter().any(|option| equals(value, option))),
        _ => Err(failure(format!("{} needs an array", operator))),
    }
}

fn regex_matches(value: Option<&Value>, pattern: &Value, flags: &str) -> Result<bool> {
    let Some(pattern) = pattern.as_str() else {
        return Err(failure("$regex has to be a string"));
    };
    let regex = get_or_compile_regex(pattern, flags)?;
    Ok(match value {
        Some(Value::String(text)) => regex.is_match(text),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|text| regex.is_match(text)),
        _ => false,
    })
}

fn get_or_compile_regex(pattern: &str, flags: &str) -> Result<Arc<Regex>> {
    let cache_key = format!("{}/{}", flags, pattern);

    if let Some(regex) = REGEX_LRU_CACHE.lock()?.get(&cache_key) {
        return Ok(Arc::clone(regex));
    }

    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(failure(format!("invalid flag in regex options: {}", other))),
        };
    }
    let compiled = Arc::new(
        builder
            .build()
            .map_err(|e| failure(format!("Invalid regular expression: {}", e)))?,
    );

    REGEX_LRU_CACHE.lock()?.put(cache_key, Arc::clone(&compiled));
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_implicit_equality_and_paths() {
        let person = doc(json!({"name": "foobar", "address": {"city": "Oslo"}, "tags": ["a", "b"]}));

        assert!(matches(&person, &json!({"name": "foobar"})).unwrap());
        assert!(!matches(&person, &json!({"name": "foobaz"})).unwrap());
        assert!(matches(&person, &json!({"address.city": "Oslo"})).unwrap());
        assert!(matches(&person, &json!({"tags": "b"})).unwrap());
        assert!(matches(&person, &json!({"missing": null})).unwrap());
        assert!(matches(&person, &Value::Null).unwrap());
    }

    #[test]
    fn test_comparison_operators() {
        let item = doc(json!({"val": 420, "scores": [1, 9]}));

        assert!(matches(&item, &json!({"val": {"$gt": 100, "$lte": 420}})).unwrap());
        assert!(!matches(&item, &json!({"val": {"$lt": 420}})).unwrap());
        assert!(matches(&item, &json!({"scores": {"$gte": 9}})).unwrap());
        assert!(matches(&item, &json!({"val": {"$in": [1, 420.0]}})).unwrap());
        assert!(matches(&item, &json!({"val": {"$nin": [1, 2]}})).unwrap());
        assert!(matches(&item, &json!({"val": {"$ne": 1}})).unwrap());
        assert!(matches(&item, &json!({"other": {"$exists": false}})).unwrap());
        assert!(!matches(&item, &json!({"val": {"$gt": "a"}})).unwrap());
    }

    #[test]
    fn test_logical_operators() {
        let item = doc(json!({"a": 1, "b": 2}));

        assert!(matches(&item, &json!({"$or": [{"a": 5}, {"b": 2}]})).unwrap());
        assert!(!matches(&item, &json!({"$and": [{"a": 1}, {"b": 3}]})).unwrap());
        assert!(matches(&item, &json!({"$nor": [{"a": 5}]})).unwrap());
        assert!(matches(&item, &json!({"a": {"$not": {"$gt": 3}}})).unwrap());
        assert!(matches(&item, &json!({"$or": []})).is_err());
    }

    #[test]
    fn test_regex_with_options() {
        let item = doc(json!({"name": "FooBar"}));

        assert!(matches(&item, &json!({"name": {"$regex": "^foo", "$options": "i"}})).unwrap());
        assert!(!matches(&item, &json!({"name": {"$regex": "^foo"}})).unwrap());
        assert!(matches(&item, &json!({"name": {"$regex": "("}})).is_err());
    }

    #[test]
    fn test_non_document_filter_is_id_equality() {
        let item = doc(json!({"_id": "ID", "a": 1}));
        assert!(matches(&item, &json!("ID")).unwrap());
        assert!(!matches(&item, &json!("OTHER")).unwrap());
    }

    #[test]
    fn test_unknown_operator_is_an_operation_failure() {
        let item = doc(json!({"a": 1}));
        let err = matches(&item, &json!({"a": {"$near": 1}})).unwrap_err();
        assert!(!err.is_transient());
        assert!(matches(&item, &json!({"$where": "x"})).is_err());
    }
}
