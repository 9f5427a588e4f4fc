//! Cursor options, sorting and projections

use std::cmp::Ordering;

use crate::args::CallArgs;
use crate::core::{Document, Result, Value, get_path, is_truthy, remove_path, set_path, sort_order};
use crate::policy::ID_FIELD;

use super::matcher::failure;

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub path: String,
    pub descending: bool,
}

/// Parses `{"field": 1, "other": -1}` or `[["field", 1], ["other", -1]]`.
pub fn parse_sort(spec: &Value) -> Result<Vec<SortKey>> {
    let key = |path: &str, direction: &Value| -> Result<SortKey> {
        let descending = match direction.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => return Err(failure(format!("bad sort direction for '{}': {}", path, direction))),
        };
        Ok(SortKey {
            path: path.to_string(),
            descending,
        })
    };

    match spec {
        Value::Null => Ok(Vec::new()),
        Value::Object(fields) => fields.iter().map(|(path, dir)| key(path, dir)).collect(),
        Value::Array(pairs) => pairs
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([Value::String(path), dir]) => key(path, dir),
                _ => Err(failure(format!("sort keys must be (key, direction) pairs, got {}", pair))),
            })
            .collect(),
        other => Err(failure(format!("invalid sort specification: {}", other))),
    }
}

pub fn sort_documents(docs: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| compare_documents(a, b, keys));
}

/// Orders two documents by `keys`; missing fields sort as `null`.
pub fn compare_documents(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = get_path(a, &key.path).unwrap_or(&Value::Null);
        let right = get_path(b, &key.path).unwrap_or(&Value::Null);
        let ord = sort_order(left, right);
        let ord = if key.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// `skip`, `limit` and `sort` keyword options of `find` and `count`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub skip: usize,
    /// Zero means no limit
    pub limit: usize,
    pub sort: Vec<SortKey>,
}

impl FindOptions {
    pub fn from_args(args: &CallArgs) -> Result<Self> {
        Ok(Self {
            skip: args.count_or("skip", 0)?,
            limit: args.count_or("limit", 0)?,
            sort: parse_sort(args.value("sort"))?,
        })
    }

    pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        sort_documents(&mut docs, &self.sort);
        let docs = docs.into_iter().skip(self.skip);
        if self.limit == 0 {
            docs.collect()
        } else {
            docs.take(self.limit).collect()
        }
    }
}

/// Field selection applied to result documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Include { fields: Vec<String>, with_id: bool },
    Exclude(Vec<String>),
}

impl Projection {
    /// Accepts `null`, a `{field: 0|1}` document or a list of field names.
    pub fn parse(spec: &Value) -> Result<Self> {
        match spec {
            Value::Null => Ok(Projection::All),
            Value::Array(names) => {
                let fields = names
                    .iter()
                    .map(|name| {
                        name.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| failure(format!("projection field names must be strings, got {}", name)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Projection::Include {
                    fields: fields.into_iter().filter(|f| f != ID_FIELD).collect(),
                    with_id: true,
                })
            }
            Value::Object(spec) => Self::from_document(spec),
            other => Err(failure(format!("projection must be a document, got {}", other))),
        }
    }

    fn from_document(spec: &Document) -> Result<Self> {
        let mut with_id = true;
        let mut included = Vec::new();
        let mut excluded = Vec::new();

        for (field, flag) in spec {
            if field == ID_FIELD {
                with_id = is_truthy(flag);
            } else if is_truthy(flag) {
                included.push(field.clone());
            } else {
                excluded.push(field.clone());
            }
        }

        match (included.is_empty(), excluded.is_empty()) {
            (false, false) => Err(failure("Projection cannot have a mix of inclusion and exclusion")),
            (false, true) => Ok(Projection::Include {
                fields: included,
                with_id,
            }),
            (true, _) => {
                if !with_id {
                    excluded.push(ID_FIELD.to_string());
                }
                Ok(if excluded.is_empty() {
                    Projection::All
                } else {
                    Projection::Exclude(excluded)
                })
            }
        }
    }

    pub fn apply(&self, doc: Document) -> Document {
        match self {
            Projection::All => doc,
            Projection::Include { fields, with_id } => {
                let mut projected = Document::new();
                if *with_id && let Some(id) = doc.get(ID_FIELD) {
                    projected.insert(ID_FIELD.to_string(), id.clone());
                }
                for field in fields {
                    if let Some(value) = get_path(&doc, field) {
                        set_path(&mut projected, field, value.clone());
                    }
                }
                projected
            }
            Projection::Exclude(fields) => {
                let mut projected = doc;
                for field in fields {
                    remove_path(&mut projected, field);
                }
                projected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_sort_specs() {
        let keys = parse_sort(&json!([["val", -1], ["name", 1]])).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].descending);

        assert!(parse_sort(&json!({"val": 2})).is_err());
        assert!(parse_sort(&json!(["val"])).is_err());
    }

    #[test]
    fn test_options_sort_skip_limit() {
        let mut args = CallArgs::new();
        args.set("sort", json!({"val": -1}));
        args.set("skip", json!(1));
        args.set("limit", json!(1));
        let options = FindOptions::from_args(&args).unwrap();

        let result = options.apply(docs(vec![json!({"val": 1}), json!({"val": 3}), json!({"val": 2})]));
        assert_eq!(result, docs(vec![json!({"val": 2})]));
    }

    #[test]
    fn test_inclusion_projection() {
        let projection = Projection::parse(&json!({"name": 1, "address.city": 1})).unwrap();
        let item = docs(vec![json!({"_id": 1, "name": "x", "val": 2, "address": {"city": "Oslo", "zip": 1}})]).remove(0);

        assert_eq!(
            Value::Object(projection.apply(item)),
            json!({"_id": 1, "name": "x", "address": {"city": "Oslo"}})
        );
    }

    #[test]
    fn test_exclusion_projection() {
        let projection = Projection::parse(&json!({"_id": 0, "val": 0})).unwrap();
        let item = docs(vec![json!({"_id": 1, "name": "x", "val": 2})]).remove(0);
        assert_eq!(Value::Object(projection.apply(item)), json!({"name": "x"}));

        assert!(Projection::parse(&json!({"a": 1, "b": 0})).is_err());
        assert_eq!(Projection::parse(&json!({})).unwrap(), Projection::All);
    }

    #[test]
    fn test_list_projection() {
        let projection = Projection::parse(&json!(["name"])).unwrap();
        let item = docs(vec![json!({"_id": 1, "name": "x", "val": 2})]).remove(0);
        assert_eq!(Value::Object(projection.apply(item)), json!({"_id": 1, "name": "x"}));
    }
}
