//! Templated query text: `?N` placeholder substitution followed by parsing.
//!
//! Substitution is textual. A string parameter is wrapped in double quotes as
//! is, without escaping, so a parameter containing `"` or `?2` changes the
//! rendered text. Callers that accept untrusted input should bind structured
//! values through the builder's structured surface instead.

use serde_json::Value;

use super::{Clause, QueryBuildError, QuerySpec, SortSpec};
use crate::store::Document;

/// Substitute `?1`, `?2`, ... in `template` with `params` (1-indexed).
///
/// A placeholder is `?` followed by the whole run of digits after it, so `?12`
/// is parameter twelve. A `?` not followed by a digit is left alone.
/// Referencing `?0` or a parameter that was not supplied is an error; unused
/// parameters are not.
pub fn render_template(template: &str, params: &[Value]) -> Result<String, String> {
    let mut rendered = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        if ch != '?' {
            rendered.push(ch);
            continue;
        }
        let mut end = start + 1;
        while let Some((i, digit)) = chars.peek().copied() {
            if !digit.is_ascii_digit() {
                break;
            }
            end = i + 1;
            chars.next();
        }
        if end == start + 1 {
            rendered.push('?');
            continue;
        }

        let placeholder = &template[start..end];
        let index: usize = placeholder[1..]
            .parse()
            .map_err(|_| format!("placeholder {} is out of range", placeholder))?;
        let param = index
            .checked_sub(1)
            .and_then(|i| params.get(i))
            .ok_or_else(|| {
                format!(
                    "placeholder {} has no matching parameter ({} supplied)",
                    placeholder,
                    params.len()
                )
            })?;
        match param {
            Value::String(s) => {
                rendered.push('"');
                rendered.push_str(s);
                rendered.push('"');
            }
            other => rendered.push_str(&other.to_string()),
        }
    }

    Ok(rendered)
}

/// Parse filter or projection text into a document.
pub fn parse_document(text: &str) -> Result<Document, String> {
    match serde_json::from_str::<Value>(text).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected an object, found {}", kind_of(&other))),
    }
}

/// Parse sort text: an array of single-key `{field: direction}` objects, e.g.
/// `[{"age": 1}, {"name": -1}]`. A single object is read as its keys in order.
pub fn parse_sort(text: &str) -> Result<SortSpec, String> {
    let entries: Vec<Document> = match serde_json::from_str::<Value>(text).map_err(|e| e.to_string())? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) if map.len() == 1 => Ok(map),
                Value::Object(map) => Err(format!(
                    "each sort entry must have exactly one field, found {}",
                    map.len()
                )),
                other => Err(format!("expected a sort object, found {}", kind_of(&other))),
            })
            .collect::<Result<_, _>>()?,
        Value::Object(map) => vec![map],
        other => {
            return Err(format!(
                "expected an array of sort objects, found {}",
                kind_of(&other)
            ))
        }
    };

    let mut sort = Vec::new();
    for entry in entries {
        for (field, direction) in entry {
            let direction = direction
                .as_i64()
                .and_then(|d| i32::try_from(d).ok())
                .ok_or_else(|| format!("sort direction for {} must be an integer, found {}", field, direction))?;
            sort.push((field, direction));
        }
    }
    Ok(sort)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub(crate) fn render_document(
    clause: Clause,
    template: &str,
    params: &[Value],
) -> Result<Document, QueryBuildError> {
    render_template(template, params)
        .and_then(|text| parse_document(&text))
        .map_err(|reason| QueryBuildError::new(clause, reason))
}

pub(crate) fn render_sort(template: &str, params: &[Value]) -> Result<SortSpec, QueryBuildError> {
    render_template(template, params)
        .and_then(|text| parse_sort(&text))
        .map_err(|reason| QueryBuildError::new(Clause::Sort, reason))
}

/// A reusable templated query, rendered with fresh parameters per call.
///
/// ```ignore
/// let adults = QueryTemplate::new(r#"{"age": {"$gte": ?1}}"#)
///     .sort(r#"[{"age": 1}]"#)
///     .page(0, 20);
/// let spec = adults.render(&[json!(18)])?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTemplate {
    pub filter: Option<String>,
    pub projection: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl QueryTemplate {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..Self::default()
        }
    }

    pub fn projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn page(mut self, page: u64, page_size: u64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Substitute `params` into every clause and parse the result.
    pub fn render(&self, params: &[Value]) -> Result<QuerySpec, QueryBuildError> {
        let filter = match &self.filter {
            Some(template) => render_document(Clause::Filter, template, params)?,
            None => Document::new(),
        };
        let projection = self
            .projection
            .as_deref()
            .map(|template| render_document(Clause::Projection, template, params))
            .transpose()?;
        let sort = self
            .sort
            .as_deref()
            .map(|template| render_sort(template, params))
            .transpose()?;

        Ok(QuerySpec {
            filter,
            projection,
            sort,
            page: self.page,
            page_size: self.page_size,
        })
    }
}
