//! Query evaluation for the in-memory store: filter matching, value ordering,
//! projection, and sorting over JSON documents.
//!
//! Only a small operator set is understood: implicit equality, `$gt`, `$gte`,
//! `$lt`, `$in`, and inclusion projections. Anything else is rejected as an
//! invalid query so a filter never silently matches the wrong documents.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::{Document, StoreError};

/// Look up a dotted path (`"address.city"`) in a document.
pub(crate) fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
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

fn insert_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !entry.is_object() {
                *entry = Value::Object(Document::new());
            }
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// Whether `doc` satisfies `filter`. An empty filter matches everything.
pub(crate) fn matches(doc: &Document, filter: &Document) -> Result<bool, StoreError> {
    for (path, condition) in filter {
        if path.starts_with('$') {
            return Err(StoreError::InvalidQuery(format!(
                "unsupported top level operator: {}",
                path
            )));
        }
        if !field_matches(lookup(doc, path), condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn is_operator_document(condition: &Value) -> bool {
    match condition {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn field_matches(field: Option<&Value>, condition: &Value) -> Result<bool, StoreError> {
    let Value::Object(operators) = condition else {
        return Ok(equals(field, condition));
    };
    if !is_operator_document(condition) {
        return Ok(equals(field, condition));
    }
    for (op, operand) in operators {
        let satisfied = match op.as_str() {
            "$gt" => compares(field, operand, |o| o == Ordering::Greater),
            "$gte" => compares(field, operand, |o| o != Ordering::Less),
            "$lt" => compares(field, operand, |o| o == Ordering::Less),
            "$in" => {
                let items = operand
                    .as_array()
                    .ok_or_else(|| StoreError::InvalidQuery("$in needs an array".into()))?;
                items.iter().any(|item| equals(field, item))
            }
            other => {
                return Err(StoreError::InvalidQuery(format!(
                    "unsupported operator: {}",
                    other
                )))
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Equality with document-store semantics: a missing field equals `null`, and an
/// array field matches when the whole array or any element equals the target.
fn equals(field: Option<&Value>, target: &Value) -> bool {
    match field {
        None => target.is_null(),
        Some(Value::Array(items)) if !target.is_array() => {
            items.iter().any(|item| values_equal(item, target))
        }
        Some(value) => values_equal(value, target),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(Some(a), Some(b)) == Ordering::Equal
}

fn compares(field: Option<&Value>, target: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(value) = field else {
        return false;
    };
    let candidates: Vec<&Value> = match value {
        Value::Array(items) if !target.is_array() => items.iter().collect(),
        other => vec![other],
    };
    candidates
        .into_iter()
        .filter(|candidate| type_rank(candidate) == type_rank(target))
        .any(|candidate| accept(compare_values(Some(candidate), Some(target))))
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

/// Integers of the same representation compare exactly; anything mixed with
/// a float goes through `f64`.
fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        return x.cmp(&y);
    }
    let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

/// Total order over values: missing/null, numbers, strings, objects, arrays, booleans.
pub(crate) fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(Some(left), Some(right));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ordering = lk
                    .cmp(rk)
                    .then_with(|| compare_values(Some(lv), Some(rv)));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

/// Stable multi-key sort. Direction `< 0` sorts descending.
pub(crate) fn sort_documents(docs: &mut [Document], sort: &[(String, i32)]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        for (field, direction) in sort {
            let ordering = compare_values(lookup(a, field), lookup(b, field));
            let ordering = if *direction < 0 { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

pub(crate) fn validate_sort(sort: &[(String, i32)]) -> Result<(), StoreError> {
    match sort.iter().find(|(_, direction)| *direction != 1 && *direction != -1) {
        Some((field, direction)) => Err(StoreError::InvalidQuery(format!(
            "bad sort direction {} for field {}",
            direction, field
        ))),
        None => Ok(()),
    }
}

fn projection_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        _ => None,
    }
}

/// Apply an inclusion projection. `_id` is kept unless it is excluded with
/// `0` or `false`; every other field must be included.
pub(crate) fn project(doc: &Document, projection: &Document) -> Result<Document, StoreError> {
    if projection.is_empty() {
        return Ok(doc.clone());
    }

    let mut include_id = true;
    let mut inclusions = Vec::new();
    for (field, spec) in projection {
        let flag = projection_flag(spec).ok_or_else(|| {
            StoreError::InvalidQuery(format!("bad projection value for {}: {}", field, spec))
        })?;
        match (field.as_str(), flag) {
            ("_id", flag) => include_id = flag,
            (_, true) => inclusions.push(field.as_str()),
            (_, false) => {
                return Err(StoreError::InvalidQuery(format!(
                    "only inclusion projections are supported, got {}: {}",
                    field, spec
                )))
            }
        }
    }

    let mut projected = Document::new();
    if include_id {
        if let Some(id) = doc.get("_id") {
            projected.insert("_id".into(), id.clone());
        }
    }
    for field in inclusions {
        if let Some(value) = lookup(doc, field) {
            insert_path(&mut projected, field, value.clone());
        }
    }
    Ok(projected)
}
