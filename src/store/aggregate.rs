//! Aggregation pipeline evaluation for the in-memory store.
//!
//! Stages: `$match`, `$group` (with `$sum` and `$avg`), `$sort`, `$count`.

use std::cmp::Ordering;

use serde_json::Value;

use super::filter::{compare_values, lookup, matches, sort_documents};
use super::{Document, StoreError};

/// Run `pipeline` over `docs`, stage by stage.
pub(crate) fn run_pipeline(
    mut docs: Vec<Document>,
    pipeline: &[Document],
) -> Result<Vec<Document>, StoreError> {
    for stage in pipeline {
        let (name, spec) = match stage.iter().next() {
            Some(entry) if stage.len() == 1 => entry,
            _ => {
                return Err(StoreError::InvalidPipeline(
                    "a pipeline stage must have exactly one field".into(),
                ))
            }
        };
        docs = match name.as_str() {
            "$match" => {
                let filter = stage_object(name, spec)?;
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$sort" => {
                let keys = stage_object(name, spec)?
                    .iter()
                    .map(|(field, direction)| {
                        direction
                            .as_i64()
                            .filter(|d| *d == 1 || *d == -1)
                            .map(|d| (field.clone(), d as i32))
                            .ok_or_else(|| {
                                StoreError::InvalidPipeline(format!(
                                    "$sort direction for {} must be 1 or -1",
                                    field
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                sort_documents(&mut docs, &keys);
                docs
            }
            "$group" => group(&docs, stage_object(name, spec)?)?,
            "$count" => {
                let field = spec.as_str().filter(|f| !f.is_empty()).ok_or_else(|| {
                    StoreError::InvalidPipeline("$count needs a nonempty field name".into())
                })?;
                if docs.is_empty() {
                    Vec::new()
                } else {
                    let mut out = Document::new();
                    out.insert(field.to_string(), Value::from(docs.len() as u64));
                    vec![out]
                }
            }
            other => {
                return Err(StoreError::InvalidPipeline(format!(
                    "unsupported pipeline stage: {}",
                    other
                )))
            }
        };
    }
    Ok(docs)
}

fn stage_object<'a>(name: &str, spec: &'a Value) -> Result<&'a Document, StoreError> {
    spec.as_object()
        .ok_or_else(|| StoreError::InvalidPipeline(format!("{} needs an object", name)))
}

/// `"$path"` reads a field; anything else is a literal.
fn evaluate(doc: &Document, expr: &Value) -> Value {
    match expr {
        Value::String(s) if s.starts_with('$') => {
            lookup(doc, &s[1..]).cloned().unwrap_or(Value::Null)
        }
        literal => literal.clone(),
    }
}

enum Accumulator {
    Sum { int: i64, float: f64, all_int: bool },
    Avg { total: f64, count: u64 },
}

impl Accumulator {
    fn new(op: &str) -> Result<Self, StoreError> {
        match op {
            "$sum" => Ok(Accumulator::Sum {
                int: 0,
                float: 0.0,
                all_int: true,
            }),
            "$avg" => Ok(Accumulator::Avg {
                total: 0.0,
                count: 0,
            }),
            other => Err(StoreError::InvalidPipeline(format!(
                "unsupported group accumulator: {}",
                other
            ))),
        }
    }

    fn add(&mut self, value: Value) {
        match self {
            Accumulator::Sum {
                int,
                float,
                all_int,
            } => {
                let Value::Number(n) = &value else {
                    return;
                };
                if *all_int {
                    if let Some(total) = n.as_i64().and_then(|i| int.checked_add(i)) {
                        *int = total;
                        return;
                    }
                    // Non-integer or overflowing input: continue the sum in f64.
                    *float = *int as f64;
                    *all_int = false;
                }
                *float += n.as_f64().unwrap_or(0.0);
            }
            Accumulator::Avg { total, count } => {
                if let Some(n) = value.as_f64() {
                    *total += n;
                    *count += 1;
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Sum {
                int,
                float,
                all_int,
            } => {
                if all_int {
                    Value::from(int)
                } else {
                    Value::from(float)
                }
            }
            Accumulator::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::from(total / count as f64)
                }
            }
        }
    }
}

struct Group {
    key: Value,
    accumulators: Vec<(String, Value, Accumulator)>,
}

fn group(docs: &[Document], spec: &Document) -> Result<Vec<Document>, StoreError> {
    let key_expr = spec
        .get("_id")
        .ok_or_else(|| StoreError::InvalidPipeline("$group needs an _id expression".into()))?;

    let mut outputs = Vec::new();
    for (field, accumulator) in spec.iter().filter(|(k, _)| *k != "_id") {
        let (op, expr) = match accumulator.as_object() {
            Some(map) if map.len() == 1 => map.iter().next().map(|(op, e)| (op.clone(), e.clone())),
            _ => None,
        }
        .ok_or_else(|| {
            StoreError::InvalidPipeline(format!(
                "accumulator {} must be an object with one operator",
                field
            ))
        })?;
        Accumulator::new(&op)?;
        outputs.push((field.clone(), op, expr));
    }

    let mut groups: Vec<Group> = Vec::new();
    for doc in docs {
        let key = evaluate(doc, key_expr);
        let index = match groups
            .iter()
            .position(|g| compare_values(Some(&g.key), Some(&key)) == Ordering::Equal)
        {
            Some(index) => index,
            None => {
                let accumulators = outputs
                    .iter()
                    .map(|(field, op, expr)| Ok((field.clone(), expr.clone(), Accumulator::new(op)?)))
                    .collect::<Result<Vec<_>, StoreError>>()?;
                groups.push(Group { key, accumulators });
                groups.len() - 1
            }
        };
        for (_, expr, accumulator) in &mut groups[index].accumulators {
            accumulator.add(evaluate(doc, expr));
        }
    }

    Ok(groups
        .into_iter()
        .map(|g| {
            let mut out = Document::new();
            out.insert("_id".into(), g.key);
            for (field, _, accumulator) in g.accumulators {
                out.insert(field, accumulator.finish());
            }
            out
        })
        .collect())
}
