//! Repository - typed CRUD and query façade over one store collection.
//!
//! Construction reads the record's schema, checks the identity type, and
//! provisions indexes. After that the repository holds only the store handle,
//! the collection name, and the cached schema, so every operation is
//! independent and the repository can be shared across threads.
//!
//! ## Example
//!
//! ```ignore
//! use docrepo::{Context, InMemoryDocumentStore, Repository};
//!
//! let ctx = Context::background();
//! let people: Repository<Person, _> = Repository::new(InMemoryDocumentStore::new())?;
//! let ann = people.save(&ctx, Person::new("ann", 30))?;
//! let loaded = people.find_by_id(&ctx, &ann.id)?;
//! let adults = people
//!     .query()
//!     .filter_template(r#"{"age": {"$gte": ?1}}"#)
//!     .bind(18)
//!     .query_many()?;
//! ```

mod cursor;

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::context::Context;
use crate::error::{RepositoryError, Result};
use crate::query::{QueryBuilder, QuerySpec};
use crate::record::{Identity, ObjectId, Record, ID_FIELD};
use crate::schema::{provision_indexes, Schema};
use crate::store::{Document, DocumentStore, FindOptions, StoreError, WriteModel};

use cursor::CursorGuard;

/// Construction-time options.
#[derive(Debug, Clone, Default)]
pub struct RepositoryConfig {
    /// Collection to use instead of `R::COLLECTION`.
    pub collection: Option<String>,
    /// Context bounding index provisioning.
    pub context: Context,
}

impl RepositoryConfig {
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

/// Typed repository for records of type `R` stored in `S`, identified by `I`.
pub struct Repository<R, S, I = ObjectId> {
    store: S,
    collection: String,
    schema: Schema,
    index_names: Vec<String>,
    _marker: PhantomData<fn() -> (R, I)>,
}

impl<R: Record, S: DocumentStore, I: Identity> Repository<R, S, I> {
    /// Build a repository for `R::COLLECTION`, provisioning its indexes.
    pub fn new(store: S) -> Result<Self> {
        Self::with_config(store, RepositoryConfig::default())
    }

    pub fn with_config(store: S, config: RepositoryConfig) -> Result<Self> {
        let schema = Schema::read::<R>()?;
        schema.identity.expect_type::<I>()?;

        let collection = config
            .collection
            .unwrap_or_else(|| R::COLLECTION.to_string());
        let index_names = provision_indexes(&store, &config.context, &collection, &schema)
            .map_err(RepositoryError::IndexProvision)?;

        debug!(
            record = schema.record,
            collection = %collection,
            identity = schema.identity.ident(),
            indexes = index_names.len(),
            "repository ready"
        );

        Ok(Self {
            store,
            collection,
            schema,
            index_names,
            _marker: PhantomData,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Names of the indexes provisioned at construction.
    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start a fluent query against this repository.
    pub fn query(&self) -> QueryBuilder<'_, R, S, I> {
        QueryBuilder::new(self)
    }

    /// Insert `record` when its identity is unset, writing the store-assigned
    /// identity back into it; otherwise replace the stored document with the
    /// same identity, inserting it if absent.
    pub fn save(&self, ctx: &Context, mut record: R) -> Result<R> {
        let identity = self.identity_of(&record)?;

        if identity.is_unset() {
            let mut document = to_document(&record)?;
            document.remove(ID_FIELD);
            let assigned = self.store.insert_one(ctx, &self.collection, document)?;
            let assigned: I = serde_json::from_value(assigned).map_err(StoreError::from)?;
            self.assign(&mut record, assigned)?;
            trace!(collection = %self.collection, "inserted record");
        } else {
            let filter = id_filter(&identity)?;
            let result =
                self.store
                    .replace_one(ctx, &self.collection, &filter, to_document(&record)?, true)?;
            trace!(
                collection = %self.collection,
                matched = result.matched_count,
                upserted = result.upserted_id.is_some(),
                "replaced record"
            );
        }

        Ok(record)
    }

    /// Save every record in one bulk write. Unset identities are generated
    /// client-side before the write, so every returned record carries one.
    pub fn save_all(&self, ctx: &Context, records: Vec<R>) -> Result<Vec<R>> {
        if records.is_empty() {
            return Ok(records);
        }

        let mut saved = Vec::with_capacity(records.len());
        let mut models = Vec::with_capacity(records.len());
        for mut record in records {
            let identity = self.identity_of(&record)?;
            if identity.is_unset() {
                self.assign(&mut record, I::generate())?;
                models.push(WriteModel::InsertOne {
                    document: to_document(&record)?,
                });
            } else {
                models.push(WriteModel::ReplaceOne {
                    filter: id_filter(&identity)?,
                    replacement: to_document(&record)?,
                    upsert: true,
                });
            }
            saved.push(record);
        }

        let result = self.store.bulk_write(ctx, &self.collection, models)?;
        trace!(
            collection = %self.collection,
            inserted = result.inserted_count,
            matched = result.matched_count,
            upserted = result.upserted_count,
            "bulk saved records"
        );
        Ok(saved)
    }

    /// Load the record with identity `id`, or `NotFound`.
    pub fn find_by_id(&self, ctx: &Context, id: &I) -> Result<R> {
        self.filter_one(ctx, &id_filter(id)?, &FindOptions::default())
    }

    /// Load every record whose identity is in `ids`. Missing ids are skipped.
    pub fn find_by_ids(&self, ctx: &Context, ids: &[I]) -> Result<Vec<R>> {
        let ids = serde_json::to_value(ids).map_err(StoreError::from)?;
        let mut filter = Document::new();
        filter.insert(ID_FIELD.into(), serde_json::json!({ "$in": ids }));
        self.filter_many(ctx, &filter, &FindOptions::default())
    }

    pub fn exists_by_id(&self, ctx: &Context, id: &I) -> Result<bool> {
        let count = self
            .store
            .count_documents(ctx, &self.collection, &id_filter(id)?, Some(1))?;
        Ok(count > 0)
    }

    /// Delete the record with identity `id`. Returns true if it existed.
    pub fn delete_by_id(&self, ctx: &Context, id: &I) -> Result<bool> {
        Ok(self.delete_one_by(ctx, &id_filter(id)?)? > 0)
    }

    pub fn find_all(&self, ctx: &Context) -> Result<Vec<R>> {
        self.filter_many(ctx, &Document::new(), &FindOptions::default())
    }

    pub fn count_all(&self, ctx: &Context) -> Result<u64> {
        Ok(self
            .store
            .count_documents(ctx, &self.collection, &Document::new(), None)?)
    }

    /// Count the records matching `spec.filter`. Pagination is ignored.
    pub fn count(&self, ctx: &Context, spec: &QuerySpec) -> Result<u64> {
        Ok(self
            .store
            .count_documents(ctx, &self.collection, &spec.filter, None)?)
    }

    /// First record matching `spec`, or `NotFound`.
    pub fn query_one(&self, ctx: &Context, spec: &QuerySpec) -> Result<R> {
        self.filter_one(ctx, &spec.filter, &spec.find_options())
    }

    pub fn query_many(&self, ctx: &Context, spec: &QuerySpec) -> Result<Vec<R>> {
        self.filter_many(ctx, &spec.filter, &spec.find_options())
    }

    /// Delete every record matching `spec.filter`. Returns the number deleted.
    pub fn delete(&self, ctx: &Context, spec: &QuerySpec) -> Result<u64> {
        self.delete_many_by(ctx, &spec.filter)
    }

    /// First record matching a raw filter, or `NotFound`.
    pub fn filter_one(&self, ctx: &Context, filter: &Document, options: &FindOptions) -> Result<R> {
        match self.store.find_one(ctx, &self.collection, filter, options)? {
            Some(document) => Ok(from_document(document)?),
            None => Err(RepositoryError::NotFound {
                collection: self.collection.clone(),
                filter: Value::Object(filter.clone()).to_string(),
            }),
        }
    }

    pub fn filter_many(
        &self,
        ctx: &Context,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<R>> {
        let cursor = self.store.find(ctx, &self.collection, filter, options)?;
        let records: Vec<R> = CursorGuard::new(cursor).collect(ctx, from_document)?;
        trace!(collection = %self.collection, count = records.len(), "fetched records");
        Ok(records)
    }

    pub fn delete_one_by(&self, ctx: &Context, filter: &Document) -> Result<u64> {
        let deleted = self.store.delete_one(ctx, &self.collection, filter)?;
        trace!(collection = %self.collection, deleted, "deleted record");
        Ok(deleted)
    }

    pub fn delete_many_by(&self, ctx: &Context, filter: &Document) -> Result<u64> {
        let deleted = self.store.delete_many(ctx, &self.collection, filter)?;
        trace!(collection = %self.collection, deleted, "deleted records");
        Ok(deleted)
    }

    /// Run `pipeline` and return its first output document, if any.
    pub fn aggregate_one(&self, ctx: &Context, pipeline: &[Document]) -> Result<Option<Document>> {
        let cursor = self.store.aggregate(ctx, &self.collection, pipeline)?;
        Ok(CursorGuard::new(cursor).next(ctx)?)
    }

    /// Run `pipeline` and return all of its output documents.
    pub fn aggregate_multiple(&self, ctx: &Context, pipeline: &[Document]) -> Result<Vec<Document>> {
        let cursor = self.store.aggregate(ctx, &self.collection, pipeline)?;
        Ok(CursorGuard::new(cursor).collect(ctx, Ok)?)
    }

    fn identity_of(&self, record: &R) -> Result<I> {
        let locator = &self.schema.identity;
        locator
            .get::<R, I>(record)
            .cloned()
            .ok_or_else(|| unreachable_identity::<R>(locator.ident()))
    }

    fn assign(&self, record: &mut R, id: I) -> Result<()> {
        let locator = &self.schema.identity;
        if locator.set::<R, I>(record, id) {
            Ok(())
        } else {
            Err(unreachable_identity::<R>(locator.ident()))
        }
    }
}

fn unreachable_identity<R>(ident: &str) -> RepositoryError {
    RepositoryError::Store(StoreError::Serde(format!(
        "identity field `{}` of {} is not reachable through Record::field",
        ident,
        std::any::type_name::<R>()
    )))
}

fn id_filter<I: Serialize>(id: &I) -> Result<Document> {
    let mut filter = Document::new();
    filter.insert(
        ID_FIELD.into(),
        serde_json::to_value(id).map_err(StoreError::from)?,
    );
    Ok(filter)
}

fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serde(format!(
            "record must serialize to an object, got {}",
            other
        ))),
    }
}

fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// Extension trait for building repositories from a cloneable store handle.
pub trait RepositoryExt: DocumentStore + Clone + Sized {
    /// Build a repository for `R` with default configuration.
    fn repository<R: Record>(&self) -> Result<Repository<R, Self>> {
        Repository::new(self.clone())
    }
}

impl<S: DocumentStore + Clone> RepositoryExt for S {}
