//! InMemoryDocumentStore - HashMap-backed document store for testing and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::aggregate::run_pipeline;
use super::filter::{lookup, matches, project, sort_documents, validate_sort};
use super::{
    BulkWriteResult, Document, DocumentCursor, DocumentStore, FindOptions, IndexKind, IndexModel,
    StoreError, UpdateResult, WriteModel,
};
use crate::context::Context;
use crate::record::{Identity, ObjectId, ID_FIELD};

const ID_INDEX: &str = "_id_";

/// A named index in a collection's catalog.
#[derive(Debug, Clone)]
struct StoredIndex {
    name: String,
    model: IndexModel,
}

/// Internal stored representation of a collection.
#[derive(Default)]
struct StoredCollection {
    documents: Vec<Document>,
    indexes: Vec<StoredIndex>,
}

impl StoredCollection {
    fn position_matching(&self, filter: &Document) -> Result<Option<usize>, StoreError> {
        for (position, doc) in self.documents.iter().enumerate() {
            if matches(doc, filter)? {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// Reject `candidate` if it collides with another document on `_id` or on a
    /// unique index. `replacing` is the position of the document being replaced.
    fn check_unique(&self, candidate: &Document, replacing: Option<usize>) -> Result<(), StoreError> {
        let others = || {
            self.documents
                .iter()
                .enumerate()
                .filter(move |(position, _)| Some(*position) != replacing)
                .map(|(_, doc)| doc)
        };

        if let Some(id) = candidate.get(ID_FIELD) {
            if others().any(|doc| doc.get(ID_FIELD) == Some(id)) {
                return Err(StoreError::DuplicateKey {
                    index: ID_INDEX.into(),
                    key: id.to_string(),
                });
            }
        }

        for index in self.indexes.iter().filter(|i| i.model.unique) {
            let Some(key) = index_key(&index.model, candidate) else {
                continue;
            };
            if others().any(|doc| index_key(&index.model, doc).as_ref() == Some(&key)) {
                return Err(StoreError::DuplicateKey {
                    index: index.name.clone(),
                    key: Value::Array(key).to_string(),
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, mut document: Document) -> Result<Value, StoreError> {
        let id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = serde_json::to_value(ObjectId::generate())?;
                document.insert(ID_FIELD.into(), id.clone());
                id
            }
        };
        self.check_unique(&document, None)?;
        self.documents.push(document);
        Ok(id)
    }

    fn replace(
        &mut self,
        filter: &Document,
        mut replacement: Document,
        upsert: bool,
    ) -> Result<UpdateResult, StoreError> {
        match self.position_matching(filter)? {
            Some(position) => {
                let existing_id = self.documents[position].get(ID_FIELD).cloned();
                if let (Some(existing), Some(new)) = (&existing_id, replacement.get(ID_FIELD)) {
                    if existing != new {
                        return Err(StoreError::Storage(
                            "the _id field of a replaced document cannot change".into(),
                        ));
                    }
                }
                if let Some(id) = existing_id {
                    replacement.insert(ID_FIELD.into(), id);
                }
                self.check_unique(&replacement, Some(position))?;
                let modified = self.documents[position] != replacement;
                self.documents[position] = replacement;
                Ok(UpdateResult {
                    matched_count: 1,
                    modified_count: u64::from(modified),
                    upserted_id: None,
                })
            }
            None if upsert => {
                if !replacement.contains_key(ID_FIELD) {
                    if let Some(id) = filter.get(ID_FIELD).filter(|v| !v.is_object()) {
                        replacement.insert(ID_FIELD.into(), id.clone());
                    }
                }
                let id = self.insert(replacement)?;
                Ok(UpdateResult {
                    matched_count: 0,
                    modified_count: 0,
                    upserted_id: Some(id),
                })
            }
            None => Ok(UpdateResult::default()),
        }
    }
}

/// Values a document contributes to an index, or `None` when a sparse index
/// skips it.
fn index_key(model: &IndexModel, doc: &Document) -> Option<Vec<Value>> {
    let values: Vec<Option<&Value>> = model.keys.iter().map(|k| lookup(doc, &k.field)).collect();
    if model.sparse && values.iter().all(Option::is_none) {
        return None;
    }
    Some(
        values
            .into_iter()
            .map(|v| v.cloned().unwrap_or(Value::Null))
            .collect(),
    )
}

fn validate_index(model: &IndexModel) -> Result<(), StoreError> {
    if model.keys.is_empty() {
        return Err(StoreError::InvalidIndex("index key pattern is empty".into()));
    }
    for key in &model.keys {
        if key.field.is_empty() {
            return Err(StoreError::InvalidIndex("index key has an empty field name".into()));
        }
        if key.kind == IndexKind::Order(0) {
            return Err(StoreError::InvalidIndex(format!(
                "bad index key pattern for {}: order cannot be 0",
                key.field
            )));
        }
    }
    Ok(())
}

/// In-memory document store backed by a HashMap of collections.
///
/// Documents keep insertion order. Clone-friendly via Arc; clones share data.
/// Cursors stay open until closed, and [`InMemoryDocumentStore::open_cursors`]
/// reports how many are outstanding.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, StoredCollection>>>,
    open_cursors: Arc<AtomicUsize>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of cursors handed out and not yet closed.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Names of the indexes defined on `collection`, `_id_` first.
    pub fn index_names(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        self.read(|collections| {
            let mut names = vec![ID_INDEX.to_string()];
            if let Some(stored) = collections.get(collection) {
                names.extend(stored.indexes.iter().map(|i| i.name.clone()));
            }
            Ok(names)
        })
    }

    /// The index definition registered under `name`, if any.
    pub fn index(&self, collection: &str, name: &str) -> Result<Option<IndexModel>, StoreError> {
        self.read(|collections| {
            Ok(collections.get(collection).and_then(|stored| {
                stored
                    .indexes
                    .iter()
                    .find(|i| i.name == name)
                    .map(|i| i.model.clone())
            }))
        })
    }

    fn read<R>(
        &self,
        f: impl FnOnce(&HashMap<String, StoredCollection>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;
        f(&collections)
    }

    fn write<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut StoredCollection) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;
        f(collections.entry(collection.to_string()).or_default())
    }

    fn matching(&self, collection: &str, filter: &Document) -> Result<Vec<Document>, StoreError> {
        self.read(|collections| {
            let Some(stored) = collections.get(collection) else {
                return Ok(Vec::new());
            };
            let mut found = Vec::new();
            for doc in &stored.documents {
                if matches(doc, filter)? {
                    found.push(doc.clone());
                }
            }
            Ok(found)
        })
    }

    fn select(
        &self,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        validate_sort(&options.sort)?;
        let mut docs = self.matching(collection, filter)?;
        sort_documents(&mut docs, &options.sort);
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(n) => n as usize,
        };
        docs.into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| match &options.projection {
                Some(projection) => project(&doc, projection),
                None => Ok(doc),
            })
            .collect()
    }

    fn cursor(&self, documents: Vec<Document>) -> InMemoryCursor {
        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        InMemoryCursor {
            documents: documents.into_iter(),
            open: Some(Arc::clone(&self.open_cursors)),
        }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    type Cursor = InMemoryCursor;

    fn create_indexes(
        &self,
        ctx: &Context,
        collection: &str,
        indexes: &[IndexModel],
    ) -> Result<Vec<String>, StoreError> {
        ctx.check()?;
        for model in indexes {
            validate_index(model)?;
        }
        self.write(collection, |stored| {
            let mut names = Vec::with_capacity(indexes.len());
            for model in indexes {
                let name = model.name();
                match stored.indexes.iter().find(|i| i.name == name) {
                    Some(existing) if existing.model == *model => {}
                    Some(_) => return Err(StoreError::IndexConflict { name }),
                    None => {
                        if model.unique {
                            let mut seen: Vec<Vec<Value>> = Vec::new();
                            for doc in &stored.documents {
                                if let Some(key) = index_key(model, doc) {
                                    if seen.contains(&key) {
                                        return Err(StoreError::DuplicateKey {
                                            index: name,
                                            key: Value::Array(key).to_string(),
                                        });
                                    }
                                    seen.push(key);
                                }
                            }
                        }
                        stored.indexes.push(StoredIndex {
                            name: name.clone(),
                            model: model.clone(),
                        });
                    }
                }
                names.push(name);
            }
            Ok(names)
        })
    }

    fn insert_one(
        &self,
        ctx: &Context,
        collection: &str,
        document: Document,
    ) -> Result<Value, StoreError> {
        ctx.check()?;
        self.write(collection, |stored| stored.insert(document))
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
        self.write(collection, |stored| stored.replace(filter, replacement, upsert))
    }

    fn bulk_write(
        &self,
        ctx: &Context,
        collection: &str,
        models: Vec<WriteModel>,
    ) -> Result<BulkWriteResult, StoreError> {
        ctx.check()?;
        self.write(collection, |stored| {
            let mut result = BulkWriteResult::default();
            for model in models {
                match model {
                    WriteModel::InsertOne { document } => {
                        stored.insert(document)?;
                        result.inserted_count += 1;
                    }
                    WriteModel::ReplaceOne {
                        filter,
                        replacement,
                        upsert,
                    } => {
                        let outcome = stored.replace(&filter, replacement, upsert)?;
                        result.matched_count += outcome.matched_count;
                        result.modified_count += outcome.modified_count;
                        if outcome.upserted_id.is_some() {
                            result.upserted_count += 1;
                        }
                    }
                }
            }
            Ok(result)
        })
    }

    fn find(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<InMemoryCursor, StoreError> {
        ctx.check()?;
        let docs = self.select(collection, filter, options)?;
        Ok(self.cursor(docs))
    }

    fn find_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        options: &FindOptions,
    ) -> Result<Option<Document>, StoreError> {
        ctx.check()?;
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        Ok(self.select(collection, filter, &options)?.into_iter().next())
    }

    fn count_documents(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
        limit: Option<u64>,
    ) -> Result<u64, StoreError> {
        ctx.check()?;
        let count = self.matching(collection, filter)?.len() as u64;
        Ok(match limit {
            Some(limit) if limit > 0 => count.min(limit),
            _ => count,
        })
    }

    fn delete_one(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
    ) -> Result<u64, StoreError> {
        ctx.check()?;
        self.write(collection, |stored| match stored.position_matching(filter)? {
            Some(position) => {
                stored.documents.remove(position);
                Ok(1)
            }
            None => Ok(0),
        })
    }

    fn delete_many(
        &self,
        ctx: &Context,
        collection: &str,
        filter: &Document,
    ) -> Result<u64, StoreError> {
        ctx.check()?;
        self.write(collection, |stored| {
            let doomed = stored
                .documents
                .iter()
                .map(|doc| matches(doc, filter))
                .collect::<Result<Vec<_>, _>>()?;
            let before = stored.documents.len();
            let mut doomed = doomed.into_iter();
            stored
                .documents
                .retain(|_| !doomed.next().unwrap_or(false));
            Ok((before - stored.documents.len()) as u64)
        })
    }

    fn aggregate(
        &self,
        ctx: &Context,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<InMemoryCursor, StoreError> {
        ctx.check()?;
        let docs = self.matching(collection, &Document::new())?;
        let results = run_pipeline(docs, pipeline)?;
        Ok(self.cursor(results))
    }
}

/// Cursor over a materialized result set.
///
/// Dropping the cursor does not release it; only [`DocumentCursor::close`] does.
pub struct InMemoryCursor {
    documents: std::vec::IntoIter<Document>,
    open: Option<Arc<AtomicUsize>>,
}

impl DocumentCursor for InMemoryCursor {
    fn next_document(&mut self, ctx: &Context) -> Result<Option<Document>, StoreError> {
        if self.open.is_none() {
            return Err(StoreError::CursorClosed);
        }
        ctx.check()?;
        Ok(self.documents.next())
    }

    fn close(&mut self) {
        if let Some(counter) = self.open.take() {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
