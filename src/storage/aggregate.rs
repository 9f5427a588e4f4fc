//! Aggregation pipeline and grouping

use std::collections::HashMap;

use serde_json::Number;

use crate::core::{Document, Result, Value, get_path, is_truthy, sort_order, values_equal};

use super::matcher::{failure, matches};
use super::query::{Projection, parse_sort, sort_documents};

/// Evaluates a field expression: `"$path"` reads the document, a plain
/// document is evaluated field by field, anything else is a literal.
pub fn evaluate(doc: &Document, expr: &Value) -> Value {
    match expr {
        Value::String(reference) if reference.starts_with('$') => {
            get_path(doc, &reference[1..]).cloned().unwrap_or(Value::Null)
        }
        Value::Object(fields) if !fields.keys().any(|key| key.starts_with('$')) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), evaluate(doc, value)))
                .collect(),
        ),
        literal => literal.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccumulatorKind {
    Sum,
    Avg,
    Min,
    Max,
    Push,
    First,
    Last,
}

impl AccumulatorKind {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "$sum" => Some(Self::Sum),
            "$avg" => Some(Self::Avg),
            "$min" => Some(Self::Min),
            "$max" => Some(Self::Max),
            "$push" => Some(Self::Push),
            "$first" => Some(Self::First),
            "$last" => Some(Self::Last),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Accumulator {
    field: String,
    kind: AccumulatorKind,
    expr: Value,
}

impl Accumulator {
    fn parse(field: &str, spec: &Value) -> Result<Self> {
        let parsed = spec.as_object().and_then(|ops| {
            let (op, expr) = ops.iter().next().filter(|_| ops.len() == 1)?;
            Some((AccumulatorKind::parse(op)?, expr.clone()))
        });
        match parsed {
            Some((kind, expr)) => Ok(Self {
                field: field.to_string(),
                kind,
                expr,
            }),
            None => Err(failure(format!(
                "The field '{}' must be an accumulator object, got {}",
                field, spec
            ))),
        }
    }
}

#[derive(Debug, Clone)]
enum AccumulatorState {
    Sum { int: i64, float: f64, is_float: bool },
    Avg { total: f64, count: u64 },
    Extreme(Option<Value>),
    Push(Vec<Value>),
    First(Option<Value>),
    Last(Value),
}

impl AccumulatorState {
    fn new(kind: AccumulatorKind) -> Self {
        match kind {
            AccumulatorKind::Sum => Self::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            AccumulatorKind::Avg => Self::Avg { total: 0.0, count: 0 },
            AccumulatorKind::Min | AccumulatorKind::Max => Self::Extreme(None),
            AccumulatorKind::Push => Self::Push(Vec::new()),
            AccumulatorKind::First => Self::First(None),
            AccumulatorKind::Last => Self::Last(Value::Null),
        }
    }

    fn add(&mut self, kind: AccumulatorKind, value: Value) {
        match self {
            Self::Sum { int, float, is_float } => {
                let Value::Number(n) = &value else { return };
                match n.as_i64().and_then(|v| int.checked_add(v)) {
                    Some(sum) if !*is_float => *int = sum,
                    _ => {
                        if !*is_float {
                            *float = *int as f64;
                            *is_float = true;
                        }
                        *float += n.as_f64().unwrap_or(0.0);
                    }
                }
            }
            Self::Avg { total, count } => {
                if let Some(n) = value.as_f64() {
                    *total += n;
                    *count += 1;
                }
            }
            Self::Extreme(current) => {
                if value.is_null() {
                    return;
                }
                let replace = match current {
                    None => true,
                    Some(existing) => {
                        let ord = sort_order(&value, existing);
                        match kind {
                            AccumulatorKind::Min => ord.is_lt(),
                            _ => ord.is_gt(),
                        }
                    }
                };
                if replace {
                    *current = Some(value);
                }
            }
            Self::Push(items) => items.push(value),
            Self::First(first) => {
                if first.is_none() {
                    *first = Some(value);
                }
            }
            Self::Last(last) => *last = value,
        }
    }

    fn finish(self) -> Value {
        match self {
            Self::Sum { int, float, is_float } => {
                if is_float {
                    Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null)
                } else {
                    Value::from(int)
                }
            }
            Self::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Number::from_f64(total / count as f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            Self::Extreme(value) | Self::First(value) => value.unwrap_or(Value::Null),
            Self::Push(items) => Value::Array(items),
            Self::Last(value) => value,
        }
    }
}

/// One output group: the evaluated key plus each accumulator's result.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: Value,
    pub fields: Document,
}

/// Groups documents by `key_expr`, in order of first appearance.
pub fn group(docs: &[Document], key_expr: &Value, accumulators: &Document) -> Result<Vec<Group>> {
    let accumulators = accumulators
        .iter()
        .map(|(field, spec)| Accumulator::parse(field, spec))
        .collect::<Result<Vec<_>>>()?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<AccumulatorState>)> = Vec::new();

    for doc in docs {
        let key = evaluate(doc, key_expr);
        let slot = *index.entry(key.to_string()).or_insert_with(|| {
            let states = accumulators.iter().map(|acc| AccumulatorState::new(acc.kind)).collect();
            groups.push((key.clone(), states));
            groups.len() - 1
        });

        let states = &mut groups[slot].1;
        for (acc, state) in accumulators.iter().zip(states.iter_mut()) {
            state.add(acc.kind, evaluate(doc, &acc.expr));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, states)| Group {
            key,
            fields: accumulators
                .iter()
                .zip(states)
                .map(|(acc, state)| (acc.field.clone(), state.finish()))
                .collect(),
        })
        .collect())
}

fn stage_count(stage: &Value, name: &str) -> Result<usize> {
    stage
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| failure(format!("{} must be a non-negative integer, got {}", name, stage)))
}

fn project(docs: Vec<Document>, spec: &Value) -> Result<Vec<Document>> {
    let Value::Object(fields) = spec else {
        return Err(failure("$project specification must be an object"));
    };

    // computed fields ("$path" or nested expressions) are split from 0/1 flags
    let (computed, flags): (Document, Document) = fields
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .partition(|(_, value)| !(value.is_boolean() || value.is_number()));

    let mut include = flags.clone();
    for key in computed.keys() {
        include.insert(key.clone(), Value::from(1));
    }
    let projection = Projection::parse(&Value::Object(include))?;

    Ok(docs
        .into_iter()
        .map(|doc| {
            let values: Vec<(String, Value)> = computed
                .iter()
                .map(|(key, expr)| (key.clone(), evaluate(&doc, expr)))
                .collect();
            let mut projected = projection.apply(doc);
            for (key, value) in values {
                projected.insert(key, value);
            }
            projected
        })
        .collect())
}

/// Runs `pipeline` over `docs`.
pub fn run_pipeline(mut docs: Vec<Document>, pipeline: &[Value]) -> Result<Vec<Document>> {
    for stage in pipeline {
        let (name, spec) = match stage.as_object() {
            Some(stage) if stage.len() == 1 => stage.iter().next().ok_or_else(|| failure("empty stage"))?,
            _ => {
                return Err(failure(format!(
                    "A pipeline stage specification object must contain exactly one field, got {}",
                    stage
                )));
            }
        };

        docs = match name.as_str() {
            "$match" => {
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, spec)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$project" => project(docs, spec)?,
            "$sort" => {
                if !spec.is_object() {
                    return Err(failure("the $sort key specification must be an object"));
                }
                sort_documents(&mut docs, &parse_sort(spec)?);
                docs
            }
            "$skip" => docs.into_iter().skip(stage_count(spec, "$skip")?).collect(),
            "$limit" => match stage_count(spec, "$limit")? {
                0 => return Err(failure("the limit must be positive")),
                n => docs.into_iter().take(n).collect(),
            },
            "$count" => {
                let field = spec
                    .as_str()
                    .filter(|field| !field.is_empty() && !field.starts_with('$'))
                    .ok_or_else(|| failure("the count field must be a non-empty string"))?;
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut counted = Document::new();
                    counted.insert(field.to_string(), Value::from(docs.len()));
                    vec![counted]
                }
            }
            "$group" => {
                let Value::Object(spec) = spec else {
                    return Err(failure("a group's fields must be specified in an object"));
                };
                let key_expr = spec
                    .get("_id")
                    .ok_or_else(|| failure("a group specification must include an _id"))?;
                let mut accumulators = spec.clone();
                accumulators.remove("_id");

                group(&docs, key_expr, &accumulators)?
                    .into_iter()
                    .map(|group| {
                        let mut out = Document::new();
                        out.insert("_id".to_string(), group.key);
                        out.extend(group.fields);
                        out
                    })
                    .collect()
            }
            other => return Err(failure(format!("Unrecognized pipeline stage name: '{}'", other))),
        };
    }
    Ok(docs)
}

/// De-duplicated values of `key` across `docs`, in order of first
/// appearance; arrays contribute their elements.
pub fn distinct_values(docs: &[Document], key: &str) -> Vec<Value> {
    let mut values: Vec<Value> = Vec::new();
    let mut push = |value: &Value| {
        if !values.iter().any(|seen| values_equal(seen, value)) {
            values.push(value.clone());
        }
    };
    for doc in docs {
        match get_path(doc, key) {
            Some(Value::Array(items)) => items.iter().for_each(&mut push),
            Some(value) => push(value),
            None => {}
        }
    }
    values
}

/// Field names selected by a legacy `group` key.
pub fn key_fields(key: &Value) -> Result<Vec<String>> {
    match key {
        Value::String(field) => Ok(vec![field.clone()]),
        Value::Array(fields) => fields
            .iter()
            .map(|f| {
                f.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| failure(format!("group key fields must be strings, got {}", f)))
            })
            .collect(),
        Value::Object(fields) => Ok(fields
            .iter()
            .filter(|(_, flag)| is_truthy(flag))
            .map(|(field, _)| field.clone())
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(failure(format!("invalid group key: {}", other))),
    }
}
