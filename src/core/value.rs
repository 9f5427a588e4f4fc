use std::cmp::Ordering;

pub use serde_json::Value;

/// A document as stored and exchanged with the transport.
pub type Document = serde_json::Map<String, Value>;

/// Orders two document values the way the reference store sorts them.
///
/// Returns `None` when the values have incompatible types; range operators
/// treat that as "does not match" rather than an error.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),

        (Value::Number(a), Value::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                return Some(a.cmp(&b));
            }
            let a = a.as_f64()?;
            let b = b.as_f64()?;
            // NaN sorts after every other number
            match (a.is_nan(), b.is_nan()) {
                (true, true) => Some(Ordering::Equal),
                (true, false) => Some(Ordering::Greater),
                (false, true) => Some(Ordering::Less),
                (false, false) => a.partial_cmp(&b),
            }
        }

        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),

        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),

        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                match compare_values(x, y)? {
                    Ordering::Equal => continue,
                    other => return Some(other),
                }
            }
            Some(a.len().cmp(&b.len()))
        }

        _ => None,
    }
}

/// Orders values of any type for sorting; mismatched types fall back to a
/// fixed type rank so a sort never fails.
pub fn sort_order(left: &Value, right: &Value) -> Ordering {
    compare_values(left, right).unwrap_or_else(|| type_rank(left).cmp(&type_rank(right)))
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Equality with numeric coercion, so `1` and `1.0` compare equal.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => {
            compare_values(left, right) == Some(Ordering::Equal)
        }
        _ => left == right,
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Resolves a dotted path (`"address.city"`) inside a document.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets a dotted path, creating intermediate objects as needed.
///
/// Returns `false` when an intermediate segment exists but is not an object.
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> bool {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
            true
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            match entry {
                Value::Object(inner) => set_path(inner, rest, value),
                _ => false,
            }
        }
    }
}

/// Removes a dotted path; returns the removed value if there was one.
pub fn remove_path(doc: &mut Document, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((head, rest)) => match doc.get_mut(head)? {
            Value::Object(inner) => remove_path(inner, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_numbers_across_representations() {
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Some(Ordering::Greater));
        assert!(values_equal(&json!(420), &json!(420.0)));
    }

    #[test]
    fn test_compare_mismatched_types() {
        assert_eq!(compare_values(&json!("a"), &json!(1)), None);
        assert_eq!(sort_order(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(sort_order(&json!("a"), &json!(1)), Ordering::Greater);
    }

    #[test]
    fn test_dotted_paths() {
        let mut doc = json!({"a": {"b": {"c": 1}}, "list": [10, 20]})
            .as_object()
            .cloned()
            .unwrap();

        assert_eq!(get_path(&doc, "a.b.c"), Some(&json!(1)));
        assert_eq!(get_path(&doc, "list.1"), Some(&json!(20)));
        assert_eq!(get_path(&doc, "a.x"), None);

        assert!(set_path(&mut doc, "a.b.d", json!("new")));
        assert_eq!(get_path(&doc, "a.b.d"), Some(&json!("new")));
        assert!(!set_path(&mut doc, "list.x", json!(1)));

        assert_eq!(remove_path(&mut doc, "a.b.c"), Some(json!(1)));
        assert_eq!(get_path(&doc, "a.b.c"), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(null)));
        assert!(is_truthy(&json!("x")));
    }
}
