//! DocumentStore - the document database a repository runs against.
//!
//! The store owns connections, query semantics, and index execution. A
//! repository only translates its calls into the primitives below. Every
//! primitive takes the caller's [`Context`] and returns a store-defined
//! [`StoreError`] on failure.
//!
//! [`InMemoryDocumentStore`] is an in-process implementation for tests and
//! development. It evaluates only a small operator subset; the `mongodb`
//! feature adds `MongoDocumentStore`, which hands queries and pipelines to a
//! MongoDB server unchanged.

mod aggregate;
mod filter;
mod in_memory;
#[cfg(feature = "mongodb")]
mod mongo;

use serde_json::Value;
use thiserror::Error;

use crate::context::Context;

pub use in_memory::{InMemoryCursor, InMemoryDocumentStore};
#[cfg(feature = "mongodb")]
pub use mongo::{MongoCursor, MongoDocumentStore};

/// A generic document: an ordered map of field names to JSON values.
pub type Document = serde_json::Map<String, Value>;

/// Error type for document store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The caller's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,
    /// The caller's context deadline passed.
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
    /// A unique index rejected the write.
    #[error("duplicate key on index {index}: {key}")]
    DuplicateKey { index: String, key: String },
    /// An index with the same name exists with different options.
    #[error("index {name} already exists with different options")]
    IndexConflict { name: String },
    /// The index definition was rejected.
    #[error("invalid index specification: {0}")]
    InvalidIndex(String),
    /// The filter, projection, or sort was rejected.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// The aggregation pipeline was rejected.
    #[error("invalid aggregation pipeline: {0}")]
    InvalidPipeline(String),
    /// Encoding a record or decoding a document failed.
    #[error("document serialization error: {0}")]
    Serde(String),
    /// The cursor was used after being closed.
    #[error("cursor is closed")]
    CursorClosed,
    /// Storage-level error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

/// Key type of one index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Ordered key; `1` ascending, `-1` descending.
    Order(i32),
    Text,
    Geo2dSphere,
}

impl IndexKind {
    pub const ASCENDING: IndexKind = IndexKind::Order(1);
    pub const DESCENDING: IndexKind = IndexKind::Order(-1);

    /// The key value as it appears in an index key document.
    pub fn to_value(&self) -> Value {
        match self {
            IndexKind::Order(order) => Value::from(*order),
            IndexKind::Text => Value::from("text"),
            IndexKind::Geo2dSphere => Value::from("2dsphere"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub kind: IndexKind,
}

/// One index to create on a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexModel {
    pub keys: Vec<IndexKey>,
    pub unique: bool,
    pub sparse: bool,
}

impl IndexModel {
    pub fn new(keys: Vec<IndexKey>) -> Self {
        Self {
            keys,
            unique: false,
            sparse: false,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    /// Default index name: `field_value` pairs joined by `_` (e.g. `name_1_age_-1`).
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|key| match key.kind {
                IndexKind::Order(order) => format!("{}_{}", key.field, order),
                IndexKind::Text => format!("{}_text", key.field),
                IndexKind::Geo2dSphere => format!("{}_2dsphere", key.field),
            })
            .collect::<Vec<_>>()
            .join("_")
    }

    /// The index key document, e.g. `{"name": 1, "age": -1}`.
    pub fn key_document(&self) -> Document {
        self.keys
            .iter()
            .map(|key| (key.field.clone(), key.kind.to_value()))
            .collect()
    }
}

/// Options for `find` / `find_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    /// Ordered `(field, direction)` pairs.
    pub sort: Vec<(String, i32)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

/// One operation in a bulk write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteModel {
    InsertOne {
        document: Document,
    },
    ReplaceOne {
        filter: Document,
        replacement: Document,
        upsert: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_count: u64,
}

/// Server-side cursor over a result set.
///
/// Cursors hold store resources until [`DocumentCursor::close`] is called.
pub trait DocumentCursor: Send {
    /// Fetch the next document, or `None` once exhausted.
    fn next_document(&mut self, ctx: &Context) -> Result<Option<Document>, StoreError>;

    /// Release the cursor. Calling it more than once is a no-op.
    fn close(&mut self);
}

/// Abstract document store. Implementations must be safe for concurrent use.
pub trait DocumentStore: Send + Sync {
    type Cursor: DocumentCursor;

    /// Create indexes, returning their names. Creating an index identical to an
    /// existing one is a no-op.
    fn create_indexes(
        &self,
        ctx: &Context,
        collection: &str,
        indexes: &[IndexModel],
    ) -> Result<Vec<String>, StoreError>;

    /// Insert a document, returning its `_id`. Assigns one when `_id` is absent.
    fn insert_one(
        &self,
        ctx: &Context,
        collection: &str,
        document: Document,
    ) -> Result<Value, StoreError>;

    /// Replace the first document matching `filter`, inserting when none
    /// matches and `upsert` is set.
    fn replace_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError>;

    /// Apply write models in order, stopping at the first failure.
    fn bulk_write(
        &self,
        ctx: &Context,
        collection: &str,
        models: Vec<WriteModel>,
    ) -> Result<BulkWriteResult, StoreError>;

    fn find(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Self::Cursor, StoreError>;

    fn find_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError>;

    /// Count matching documents, stopping at `limit` when given.
    fn count_documents(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        limit: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Delete the first matching document. Returns the number deleted (0 or 1).
    fn delete_one(&self, ctx: &Context, collection: &str, filter: &Document)
        -> Result<u64, StoreError>;

    /// Delete every matching document. Returns the number deleted.
    fn delete_many(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
    ) -> Result<u64, StoreError>;

    /// Run an aggregation pipeline.
    fn aggregate(
        &self,
        ctx: &Context,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Self::Cursor, StoreError>;
}
