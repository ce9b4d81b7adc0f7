//! Schema - identity and index metadata derived from a record's field annotations.
//!
//! [`Schema::read`] runs once per repository: it locates the identity field
//! and parses every index annotation. The result is immutable for the
//! repository's lifetime; [`provision_indexes`] turns its index specifications
//! into store index-creation requests.

mod identity;
mod provisioner;
mod reader;

use thiserror::Error;

use crate::store::{IndexKey, IndexKind, IndexModel};

pub use identity::IdentityLocator;
pub use provisioner::provision_indexes;
pub use reader::{parse_compound_indexes, parse_index_annotation};

/// Error type for record schema problems. Raised only while constructing a repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No field is stored as `_id`.
    #[error("no identity field declared on {record} (expected a field stored as `_id`)")]
    MissingIdentity { record: &'static str },
    /// The identity field's type does not match the repository's identity type.
    #[error("identity field `{field}` has type {actual}, repository expects {expected}")]
    IdentityType {
        field: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    /// An index annotation contains a token outside the recognized set.
    #[error("unsupported index token `{token}` on field `{field}`")]
    UnknownIndexToken { field: String, token: String },
    /// An index annotation names more than one order or kind.
    #[error("field `{field}` declares both `{first}` and `{second}`; an index takes one order or kind")]
    ConflictingIndexKind {
        field: String,
        first: String,
        second: String,
    },
    /// A compound index annotation could not be parsed.
    #[error("invalid compound index `{fragment}`: {reason}")]
    MalformedCompoundIndex { fragment: String, reason: String },
}

/// One single-field index derived from an `index` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Stored field name.
    pub field: String,
    pub kind: IndexKind,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexSpec {
    pub fn to_model(&self) -> IndexModel {
        IndexModel::new(vec![IndexKey {
            field: self.field.clone(),
            kind: self.kind,
        }])
        .unique(self.unique)
        .sparse(self.sparse)
    }
}

/// One compound index: ordered `(field, order)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundIndexSpec {
    pub keys: Vec<(String, i32)>,
}

impl CompoundIndexSpec {
    pub fn to_model(&self) -> IndexModel {
        IndexModel::new(
            self.keys
                .iter()
                .map(|(field, order)| IndexKey {
                    field: field.clone(),
                    kind: IndexKind::Order(*order),
                })
                .collect(),
        )
    }
}

/// Everything a repository needs to know about a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub record: &'static str,
    pub identity: IdentityLocator,
    pub indexes: Vec<IndexSpec>,
    pub compound_indexes: Vec<CompoundIndexSpec>,
}

impl Schema {
    /// Derive the schema of `R` from its field descriptors.
    pub fn read<R: crate::Record>() -> Result<Schema, SchemaError> {
        reader::read_schema::<R>()
    }
}
