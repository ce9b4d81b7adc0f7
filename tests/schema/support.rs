//! A store wrapper that records index-creation requests.

use docrepo::{
    BulkWriteResult, Context, Document, DocumentStore, FindOptions, InMemoryCursor,
    InMemoryDocumentStore, IndexModel, StoreError, UpdateResult, WriteModel,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct RecordingStore {
    pub inner: InMemoryDocumentStore,
    pub index_requests: Arc<Mutex<Vec<Vec<String>>>>,
}

impl RecordingStore {
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.index_requests.lock().unwrap().clone()
    }
}

impl DocumentStore for RecordingStore {
    type Cursor = InMemoryCursor;

    fn create_indexes(
        &self,
        ctx: &Context,
        collection: &str,
        indexes: &[IndexModel],
    ) -> Result<Vec<String>, StoreError> {
        self.index_requests
            .lock()
            .unwrap()
            .push(indexes.iter().map(IndexModel::name).collect());
        self.inner.create_indexes(ctx, collection, indexes)
    }

    fn insert_one(&self, ctx: &Context, collection: &str, document: Document) -> Result<Value, StoreError> {
        self.inner.insert_one(ctx, collection, document)
    }

    fn replace_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        replacement: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError> {
        self.inner.replace_one(ctx, collection, filter, replacement, upsert)
    }

    fn bulk_write(
        &self,
        ctx: &Context,
        collection: &str,
        models: Vec<WriteModel>,
    ) -> Result<BulkWriteResult, StoreError> {
        self.inner.bulk_write(ctx, collection, models)
    }

    fn find(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<InMemoryCursor, StoreError> {
        self.inner.find(ctx, collection, filter, options)
    }

    fn find_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.find_one(ctx, collection, filter, options)
    }

    fn count_documents(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        limit: Option<u64>,
    ) -> Result<u64, StoreError> {
        self.inner.count_documents(ctx, collection, filter, limit)
    }

    fn delete_one(&self, ctx: &Context, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        self.inner.delete_one(ctx, collection, filter)
    }

    fn delete_many(&self, ctx: &Context, collection: &str, filter: &Document) -> Result<u64, StoreError> {
        self.inner.delete_many(ctx, collection, filter)
    }

    fn aggregate(
        &self,
        ctx: &Context,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<InMemoryCursor, StoreError> {
        self.inner.aggregate(ctx, collection, pipeline)
    }
}
