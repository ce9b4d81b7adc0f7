use crate::record::{FieldDescriptor, Record};
use crate::store::IndexKind;

use super::{CompoundIndexSpec, IdentityLocator, IndexSpec, Schema, SchemaError};

pub(crate) fn read_schema<R: Record>() -> Result<Schema, SchemaError> {
    let record = std::any::type_name::<R>();
    let fields = R::fields();

    let identity = locate_identity(record, fields)?;

    let indexes = fields
        .iter()
        .filter_map(|field| {
            field
                .index
                .map(|annotation| parse_index_annotation(field.name, annotation))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut compound_indexes = Vec::new();
    let annotations = R::compound_indexes()
        .into_iter()
        .chain(fields.iter().filter_map(|field| field.compound_index));
    for annotation in annotations {
        compound_indexes.extend(parse_compound_indexes(annotation)?);
    }

    Ok(Schema {
        record,
        identity,
        indexes,
        compound_indexes,
    })
}

/// First field, in declaration order, stored as `_id`.
fn locate_identity(
    record: &'static str,
    fields: &'static [FieldDescriptor],
) -> Result<IdentityLocator, SchemaError> {
    fields
        .iter()
        .find(|field| field.is_identity())
        .map(IdentityLocator::from_descriptor)
        .ok_or(SchemaError::MissingIdentity { record })
}

/// Parse an `index` annotation such as `"1"`, `"-1, unique"`, or `"text"`.
///
/// Recognized tokens: `1`, `-1`, `text`, `2dsphere`, `unique`, `sparse`. At most
/// one order/kind token is allowed; without one the index is ascending.
pub fn parse_index_annotation(field: &str, annotation: &str) -> Result<IndexSpec, SchemaError> {
    let mut kind: Option<(IndexKind, &str)> = None;
    let mut unique = false;
    let mut sparse = false;

    for token in annotation.split(',').map(str::trim) {
        let parsed = match token {
            "1" => IndexKind::ASCENDING,
            "-1" => IndexKind::DESCENDING,
            "text" => IndexKind::Text,
            "2dsphere" => IndexKind::Geo2dSphere,
            "unique" => {
                unique = true;
                continue;
            }
            "sparse" => {
                sparse = true;
                continue;
            }
            other => {
                return Err(SchemaError::UnknownIndexToken {
                    field: field.to_string(),
                    token: other.to_string(),
                })
            }
        };
        if let Some((_, first)) = kind {
            return Err(SchemaError::ConflictingIndexKind {
                field: field.to_string(),
                first: first.to_string(),
                second: token.to_string(),
            });
        }
        kind = Some((parsed, token));
    }

    Ok(IndexSpec {
        field: field.to_string(),
        kind: kind.map(|(kind, _)| kind).unwrap_or(IndexKind::ASCENDING),
        unique,
        sparse,
    })
}

/// Parse a compound index annotation: `;`-separated brace groups of
/// comma-separated `field:order` pairs, e.g. `"{name:1,age:-1};{age:1}"`.
pub fn parse_compound_indexes(annotation: &str) -> Result<Vec<CompoundIndexSpec>, SchemaError> {
    let malformed = |fragment: &str, reason: &str| SchemaError::MalformedCompoundIndex {
        fragment: fragment.to_string(),
        reason: reason.to_string(),
    };

    let mut specs = Vec::new();
    for group in annotation.split(';').map(str::trim) {
        if group.is_empty() {
            continue;
        }
        let inner = match (group.strip_prefix('{'), group.ends_with('}')) {
            (Some(rest), true) => &rest[..rest.len() - 1],
            (None, false) => group,
            _ => return Err(malformed(group, "unbalanced braces")),
        };

        let mut keys = Vec::new();
        for pair in inner.split(',').map(str::trim) {
            let parts: Vec<&str> = pair.split(':').map(str::trim).collect();
            let [field, order] = parts.as_slice() else {
                return Err(malformed(pair, "expected a `field:order` pair"));
            };
            if field.is_empty() {
                return Err(malformed(pair, "empty field name"));
            }
            let order: i32 = order
                .parse()
                .map_err(|_| malformed(pair, "order must be an integer"))?;
            keys.push((field.to_string(), order));
        }
        specs.push(CompoundIndexSpec { keys });
    }
    Ok(specs)
}
