//! MongoDocumentStore - the MongoDB driver behind the [`DocumentStore`] trait.
//!
//! Documents cross the boundary as relaxed extended JSON, so a stored BSON
//! `ObjectId` reads back as `{"$oid": "..."}`. Identities assigned by this
//! store are [`ObjectId`](crate::ObjectId) strings, matching the in-memory store.
//!
//! The synchronous driver has no cancellation hook. The context is checked
//! before each request and between cursor batches, and a deadline becomes the
//! server-side `maxTimeMS` of reads and aggregations.
//!
//! ```ignore
//! let store = MongoDocumentStore::connect("mongodb://localhost:27017", "app")?;
//! let people: Repository<Person, _> = Repository::new(store)?;
//! ```

use mongodb::bson::{self, Bson, Document as BsonDocument};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::sync::{Client, Collection, Cursor, Database};
use serde_json::Value;
use tracing::{debug, trace};

use crate::context::Context;
use crate::record::{Identity, ObjectId, ID_FIELD};

use super::{
    BulkWriteResult, Document, DocumentCursor, DocumentStore, FindOptions, IndexModel, StoreError,
    UpdateResult, WriteModel,
};

const DUPLICATE_KEY: i32 = 11000;
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
const MAX_TIME_EXPIRED: i32 = 50;

/// A [`DocumentStore`] over one MongoDB database. Clones share the client's
/// connection pool.
#[derive(Clone, Debug)]
pub struct MongoDocumentStore {
    database: Database,
}

impl MongoDocumentStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Connect with a connection string and select `database`.
    pub fn connect(uri: &str, database: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).map_err(store_error)?;
        debug!(database, "connected to mongodb");
        Ok(Self::new(client.database(database)))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> Collection<BsonDocument> {
        self.database.collection(name)
    }
}

impl DocumentStore for MongoDocumentStore {
    type Cursor = MongoCursor;

    fn create_indexes(
        &self,
        ctx: &Context,
        collection: &str,
        indexes: &[IndexModel],
    ) -> Result<Vec<String>, StoreError> {
        ctx.check()?;
        if indexes.is_empty() {
            return Ok(Vec::new());
        }
        let models = indexes
            .iter()
            .map(to_mongo_index)
            .collect::<Result<Vec<_>, _>>()?;
        let created = self
            .collection(collection)
            .create_indexes(models)
            .run()
            .map_err(|err| index_error(err, indexes))?;
        trace!(collection, indexes = ?created.index_names, "created indexes");
        Ok(created.index_names)
    }

    fn insert_one(
        &self,
        ctx: &Context,
        collection: &str,
        mut document: Document,
    ) -> Result<Value, StoreError> {
        ctx.check()?;
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = serde_json::to_value(ObjectId::generate())?;
                document.insert(ID_FIELD.into(), id.clone());
                id
            }
        };
        self.collection(collection)
            .insert_one(to_bson_document(&document)?)
            .run()
            .map_err(store_error)?;
        Ok(id)
    }

    fn replace_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError> {
        ctx.check()?;
        let result = self
            .collection(collection)
            .replace_one(to_bson_document(filter)?, to_bson_document(&replacement)?)
            .upsert(upsert)
            .run()
            .map_err(store_error)?;
        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id.map(Bson::into_relaxed_extjson),
        })
    }

    /// Models are sent one at a time, in order; the first failure stops the
    /// write and earlier models stay applied.
    fn bulk_write(
        &self,
        ctx: &Context,
        collection: &str,
        models: Vec<WriteModel>,
    ) -> Result<BulkWriteResult, StoreError> {
        let mut result = BulkWriteResult::default();
        for model in models {
            match model {
                WriteModel::InsertOne { document } => {
                    self.insert_one(ctx, collection, document)?;
                    result.inserted_count += 1;
                }
                WriteModel::ReplaceOne {
                    filter,
                    replacement,
                    upsert,
                } => {
                    let outcome = self.replace_one(ctx, collection, &filter, replacement, upsert)?;
                    result.matched_count += outcome.matched_count;
                    result.modified_count += outcome.modified_count;
                    if outcome.upserted_id.is_some() {
                        result.upserted_count += 1;
                    }
                }
            }
        }
        Ok(result)
    }

    fn find(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<MongoCursor, StoreError> {
        ctx.check()?;
        let coll = self.collection(collection);
        let mut find = coll.find(to_bson_document(filter)?);
        if let Some(projection) = &options.projection {
            find = find.projection(to_bson_document(projection)?);
        }
        if !options.sort.is_empty() {
            find = find.sort(sort_document(&options.sort));
        }
        if let Some(skip) = options.skip {
            find = find.skip(skip);
        }
        if let Some(limit) = options.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(remaining) = ctx.remaining() {
            find = find.max_time(remaining);
        }
        let cursor = find.run().map_err(|err| query_error(err, StoreError::InvalidQuery))?;
        Ok(MongoCursor::new(cursor))
    }

    fn find_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError> {
        ctx.check()?;
        let coll = self.collection(collection);
        let mut find = coll.find_one(to_bson_document(filter)?);
        if let Some(projection) = &options.projection {
            find = find.projection(to_bson_document(projection)?);
        }
        if !options.sort.is_empty() {
            find = find.sort(sort_document(&options.sort));
        }
        if let Some(skip) = options.skip {
            find = find.skip(skip);
        }
        if let Some(remaining) = ctx.remaining() {
            find = find.max_time(remaining);
        }
        find.run()
            .map_err(|err| query_error(err, StoreError::InvalidQuery))?
            .map(from_bson_document)
            .transpose()
    }

    fn count_documents(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        limit: Option<u64>,
    ) -> Result<u64, StoreError> {
        ctx.check()?;
        let coll = self.collection(collection);
        let mut count = coll.count_documents(to_bson_document(filter)?);
        if let Some(limit) = limit {
            count = count.limit(limit);
        }
        if let Some(remaining) = ctx.remaining() {
            count = count.max_time(remaining);
        }
        count
            .run()
            .map_err(|err| query_error(err, StoreError::InvalidQuery))
    }

    fn delete_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
    ) -> Result<u64, StoreError> {
        ctx.check()?;
        let result = self
            .collection(collection)
            .delete_one(to_bson_document(filter)?)
            .run()
            .map_err(|err| query_error(err, StoreError::InvalidQuery))?;
        Ok(result.deleted_count)
    }

    fn delete_many(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
    ) -> Result<u64, StoreError> {
        ctx.check()?;
        let result = self
            .collection(collection)
            .delete_many(to_bson_document(filter)?)
            .run()
            .map_err(|err| query_error(err, StoreError::InvalidQuery))?;
        Ok(result.deleted_count)
    }

    fn aggregate(
        &self,
        ctx: &Context,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<MongoCursor, StoreError> {
        ctx.check()?;
        let stages = pipeline
            .iter()
            .map(to_bson_document)
            .collect::<Result<Vec<_>, _>>()?;
        let coll = self.collection(collection);
        let mut aggregate = coll.aggregate(stages);
        if let Some(remaining) = ctx.remaining() {
            aggregate = aggregate.max_time(remaining);
        }
        let cursor = aggregate
            .run()
            .map_err(|err| query_error(err, StoreError::InvalidPipeline))?;
        Ok(MongoCursor::new(cursor))
    }
}

/// Driver cursor. Closing drops it, which kills the server-side cursor.
pub struct MongoCursor {
    inner: Option<Cursor<BsonDocument>>,
}

impl MongoCursor {
    fn new(cursor: Cursor<BsonDocument>) -> Self {
        Self {
            inner: Some(cursor),
        }
    }
}

impl DocumentCursor for MongoCursor {
    fn next_document(&mut self, ctx: &Context) -> Result<Option<Document>, StoreError> {
        let cursor = self.inner.as_mut().ok_or(StoreError::CursorClosed)?;
        ctx.check()?;
        match cursor.next() {
            Some(document) => from_bson_document(document.map_err(store_error)?).map(Some),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.inner.take();
    }
}

fn to_bson_document(document: &Document) -> Result<BsonDocument, StoreError> {
    bson::to_document(document).map_err(|err| StoreError::Serde(err.to_string()))
}

fn from_bson_document(document: BsonDocument) -> Result<Document, StoreError> {
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serde(format!("expected a document, got {}", other))),
    }
}

fn sort_document(sort: &[(String, i32)]) -> BsonDocument {
    sort.iter()
        .map(|(field, direction)| (field.clone(), Bson::Int32(*direction)))
        .collect()
}

fn to_mongo_index(model: &IndexModel) -> Result<mongodb::IndexModel, StoreError> {
    let options = IndexOptions::builder()
        .name(model.name())
        .unique(model.unique.then_some(true))
        .sparse(model.sparse.then_some(true))
        .build();
    Ok(mongodb::IndexModel::builder()
        .keys(to_bson_document(&model.key_document())?)
        .options(options)
        .build())
}

/// Split `E11000 ... index: <name> dup key: <key>` into its index name and key.
fn parse_duplicate_key(message: &str) -> (String, String) {
    let index = message
        .split_once("index: ")
        .map(|(_, rest)| rest.split_whitespace().next().unwrap_or_default().to_string())
        .unwrap_or_default();
    let key = message
        .split_once("dup key: ")
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_else(|| message.to_string());
    (index, key)
}

fn store_error(err: MongoError) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            let (index, key) = parse_duplicate_key(&write.message);
            StoreError::DuplicateKey { index, key }
        }
        ErrorKind::Command(command) if command.code == DUPLICATE_KEY => {
            let (index, key) = parse_duplicate_key(&command.message);
            StoreError::DuplicateKey { index, key }
        }
        ErrorKind::Command(command) if command.code == MAX_TIME_EXPIRED => {
            StoreError::DeadlineExceeded
        }
        ErrorKind::BsonSerialization(err) => StoreError::Serde(err.to_string()),
        ErrorKind::BsonDeserialization(err) => StoreError::Serde(err.to_string()),
        _ => StoreError::Storage(err.to_string()),
    }
}

/// Server-rejected commands become `invalid`; everything else maps as usual.
fn query_error(err: MongoError, invalid: fn(String) -> StoreError) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Command(command)
            if command.code != DUPLICATE_KEY && command.code != MAX_TIME_EXPIRED =>
        {
            invalid(command.message.clone())
        }
        _ => store_error(err),
    }
}

fn index_error(err: MongoError, requested: &[IndexModel]) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::Command(command)
            if command.code == INDEX_OPTIONS_CONFLICT || command.code == INDEX_KEY_SPECS_CONFLICT =>
        {
            let names: Vec<String> = requested.iter().map(IndexModel::name).collect();
            let name = names
                .iter()
                .find(|name| command.message.contains(name.as_str()))
                .or_else(|| names.first())
                .cloned()
                .unwrap_or_default();
            StoreError::IndexConflict { name }
        }
        _ => store_error(err),
    }
}
