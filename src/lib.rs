//! docrepo - a typed repository layer over document stores.
//!
//! Records declare their identity and indexes with field annotations; a
//! [`Repository`] reads those once, provisions the indexes, and then offers
//! upserts with identity backfill, identity lookups, structured or templated
//! queries, and aggregation pass-through against any [`DocumentStore`].

extern crate self as docrepo;

mod context;
mod error;
mod query;
mod record;
mod repository;
mod schema;
mod store;

pub use context::Context;
pub use error::{RepositoryError, Result};
pub use query::{
    parse_document, parse_sort, render_template, Clause, QueryBuildError, QueryBuilder, QuerySpec,
    QueryTemplate, SortSpec,
};
pub use record::{FieldDescriptor, Identity, ObjectId, Record, ID_FIELD};
pub use repository::{Repository, RepositoryConfig, RepositoryExt};
pub use schema::{
    parse_compound_indexes, parse_index_annotation, provision_indexes, CompoundIndexSpec,
    IdentityLocator, IndexSpec, Schema, SchemaError,
};
pub use store::{
    BulkWriteResult, Document, DocumentCursor, DocumentStore, FindOptions, InMemoryCursor,
    InMemoryDocumentStore, IndexKey, IndexKind, IndexModel, StoreError, UpdateResult, WriteModel,
};

#[cfg(feature = "mongodb")]
pub use store::{MongoCursor, MongoDocumentStore};

// Re-export the derive macro so users can `use docrepo::Record` for both.
#[cfg(feature = "derive")]
pub use docrepo_macros::Record;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

/// Build a [`Document`] from JSON object syntax.
///
/// ```ignore
/// let filter = doc!({ "age": { "$gte": 30 } });
/// ```
#[macro_export]
macro_rules! doc {
    ($($json:tt)+) => {
        match $crate::__private::serde_json::json!($($json)+) {
            $crate::__private::serde_json::Value::Object(map) => map,
            other => panic!("doc! expects a JSON object, got {}", other),
        }
    };
}
