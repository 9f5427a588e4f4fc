//! Update documents: operator updates and whole-document replacement

use serde_json::Number;

use crate::core::{Document, Result, Value, get_path, remove_path, set_path, type_name};
use crate::policy::ID_FIELD;

use super::matcher::failure;

/// Shape of an update argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Operators,
    Replacement,
}

/// Classifies an update document; mixing `$` operators and plain fields fails.
pub fn classify(update: &Document) -> Result<UpdateKind> {
    let operators = update.keys().filter(|key| key.starts_with('$')).count();
    match operators {
        0 => Ok(UpdateKind::Replacement),
        n if n == update.len() => Ok(UpdateKind::Operators),
        _ => Err(failure("update document cannot mix $ operators and plain fields")),
    }
}

/// Applies `$set`, `$unset`, `$inc`, `$push` and `$setOnInsert` in place.
///
/// `$setOnInsert` only takes effect when `inserting` is true.
pub fn apply_operators(doc: &mut Document, update: &Document, inserting: bool) -> Result<()> {
    for (op, fields) in update {
        let Value::Object(fields) = fields else {
            return Err(failure(format!(
                "Modifiers operate on fields but we found type {} instead",
                type_name(fields)
            )));
        };

        for (path, operand) in fields {
            match op.as_str() {
                "$set" => set_field(doc, path, operand.clone())?,
                "$setOnInsert" => {
                    if inserting {
                        set_field(doc, path, operand.clone())?;
                    }
                }
                "$unset" => {
                    remove_path(doc, path);
                }
                "$inc" => {
                    let current = get_path(doc, path).cloned().unwrap_or(Value::Null);
                    set_field(doc, path, increment(path, &current, operand)?)?;
                }
                "$push" => {
                    let pushed = match get_path(doc, path) {
                        None | Some(Value::Null) => Value::Array(vec![operand.clone()]),
                        Some(Value::Array(items)) => {
                            let mut items = items.clone();
                            items.push(operand.clone());
                            Value::Array(items)
                        }
                        Some(other) => {
                            return Err(failure(format!(
                                "The field '{}' must be an array but is of type {}",
                                path,
                                type_name(other)
                            )));
                        }
                    };
                    set_field(doc, path, pushed)?;
                }
                other => return Err(failure(format!("Unknown modifier: {}", other))),
            }
        }
    }
    Ok(())
}

/// Replaces a document's contents, keeping its `_id`.
pub fn replace(existing: &Document, replacement: &Document) -> Result<Document> {
    let mut replaced = Document::new();
    if let Some(id) = existing.get(ID_FIELD) {
        if replacement.get(ID_FIELD).is_some_and(|new_id| new_id != id) {
            return Err(failure(format!(
                "the (immutable) field '{}' was found to have been altered",
                ID_FIELD
            )));
        }
        replaced.insert(ID_FIELD.to_string(), id.clone());
    }
    for (key, value) in replacement {
        if key != ID_FIELD {
            replaced.insert(key.clone(), value.clone());
        }
    }
    Ok(replaced)
}

/// Starting document of an upsert: the filter's plain equality fields.
pub fn seed_from_filter(filter: &Value) -> Document {
    let mut seed = Document::new();
    match filter {
        Value::Object(query) => {
            for (key, value) in query {
                if key.starts_with('$') {
                    continue;
                }
                let is_operator = matches!(value, Value::Object(map) if map.keys().any(|k| k.starts_with('$')));
                if !is_operator {
                    set_path(&mut seed, key, value.clone());
                }
            }
        }
        Value::Null => {}
        id => {
            seed.insert(ID_FIELD.to_string(), id.clone());
        }
    }
    seed
}

fn set_field(doc: &mut Document, path: &str, value: Value) -> Result<()> {
    if set_path(doc, path, value) {
        Ok(())
    } else {
        Err(failure(format!("Cannot create field in '{}'", path)))
    }
}

fn increment(path: &str, current: &Value, by: &Value) -> Result<Value> {
    let Value::Number(by) = by else {
        return Err(failure(format!("Cannot increment with non-numeric argument: {{{}: {}}}", path, by)));
    };
    let current = match current {
        Value::Null => return Ok(Value::Number(by.clone())),
        Value::Number(n) => n,
        other => {
            return Err(failure(format!(
                "Cannot apply $inc to a value of non-numeric type {}",
                type_name(other)
            )));
        }
    };

    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64())
        && let Some(sum) = a.checked_add(b)
    {
        return Ok(Value::from(sum));
    }
    let sum = current.as_f64().unwrap_or(0.0) + by.as_f64().unwrap_or(0.0);
    Number::from_f64(sum)
        .map(Value::Number)
        .ok_or_else(|| failure(format!("$inc on '{}' produced a non-finite number", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&doc(json!({"$set": {"a": 1}}))).unwrap(), UpdateKind::Operators);
        assert_eq!(classify(&doc(json!({"a": 1}))).unwrap(), UpdateKind::Replacement);
        assert!(classify(&doc(json!({"$set": {"a": 1}, "b": 2}))).is_err());
    }

    #[test]
    fn test_operators() {
        let mut item = doc(json!({"val": 1, "drop": true, "list": [1]}));
        let update = doc(json!({
            "$set": {"nested.field": "x"},
            "$unset": {"drop": ""},
            "$inc": {"val": 2, "fresh": 5},
            "$push": {"list": 2},
            "$setOnInsert": {"created": true}
        }));
        apply_operators(&mut item, &update, false).unwrap();

        assert_eq!(
            Value::Object(item),
            json!({"val": 3, "fresh": 5, "list": [1, 2], "nested": {"field": "x"}})
        );
    }

    #[test]
    fn test_set_on_insert_only_when_inserting() {
        let mut item = Document::new();
        apply_operators(&mut item, &doc(json!({"$setOnInsert": {"a": 1}})), true).unwrap();
        assert_eq!(item.get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_inc_rejects_non_numbers() {
        let mut item = doc(json!({"name": "x"}));
        assert!(apply_operators(&mut item, &doc(json!({"$inc": {"name": 1}})), false).is_err());
        assert!(apply_operators(&mut item, &doc(json!({"$inc": {"n": "1"}})), false).is_err());
        assert!(apply_operators(&mut item, &doc(json!({"$rename": {"a": "b"}})), false).is_err());
    }

    #[test]
    fn test_replace_keeps_id() {
        let existing = doc(json!({"_id": "a", "val": 1}));
        let replaced = replace(&existing, &doc(json!({"val": 2}))).unwrap();
        assert_eq!(Value::Object(replaced), json!({"_id": "a", "val": 2}));

        assert!(replace(&existing, &doc(json!({"_id": "b"}))).is_err());
    }

    #[test]
    fn test_seed_from_filter() {
        let seed = seed_from_filter(&json!({"name": "foobar", "val": {"$gt": 1}, "$or": [{"a": 1}]}));
        assert_eq!(Value::Object(seed), json!({"name": "foobar"}));
        assert_eq!(Value::Object(seed_from_filter(&json!("ID"))), json!({"_id": "ID"}));
    }
}
