use serde::Serialize;
use serde_json::Value;

use crate::context::Context;
use crate::error::Result;
use crate::record::{Identity, ObjectId, Record};
use crate::repository::Repository;
use crate::store::{Document, DocumentStore};

use super::template::{render_document, render_sort};
use super::{Clause, QueryBuildError, QuerySpec, SortSpec};

/// A clause staged on the builder: absent, structured, or template text.
#[derive(Debug, Clone)]
enum Staged<T> {
    Unset,
    Value(T),
    Template(String),
}

impl<T> Staged<T> {
    fn resolve(
        self,
        render: impl FnOnce(&str) -> Result<T, QueryBuildError>,
    ) -> Result<Option<T>, QueryBuildError> {
        match self {
            Staged::Unset => Ok(None),
            Staged::Value(value) => Ok(Some(value)),
            Staged::Template(template) => render(&template).map(Some),
        }
    }
}

/// Chainable accumulator for one query against a repository.
///
/// Each clause is either structured (`filter`, `projection`, `sort`) or a
/// template (`*_template`) whose `?N` placeholders are filled from the
/// parameters passed to [`QueryBuilder::bind`], in order. Setting a clause
/// again replaces it. Templates are rendered and parsed only when a terminal
/// call runs; a failure there is a [`QueryBuildError`] and nothing executes.
///
/// Terminal calls consume the builder. Without [`QueryBuilder::context`]
/// the query runs under [`Context::background`].
pub struct QueryBuilder<'r, R, S, I = ObjectId> {
    repository: &'r Repository<R, S, I>,
    context: Option<Context>,
    filter: Staged<Document>,
    projection: Staged<Document>,
    sort: Staged<SortSpec>,
    page: Option<u64>,
    page_size: Option<u64>,
    params: Vec<Value>,
    param_error: Option<QueryBuildError>,
}

impl<'r, R: Record, S: DocumentStore, I: Identity> QueryBuilder<'r, R, S, I> {
    pub(crate) fn new(repository: &'r Repository<R, S, I>) -> Self {
        Self {
            repository,
            context: None,
            filter: Staged::Unset,
            projection: Staged::Unset,
            sort: Staged::Unset,
            page: None,
            page_size: None,
            params: Vec::new(),
            param_error: None,
        }
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn filter(mut self, filter: Document) -> Self {
        self.filter = Staged::Value(filter);
        self
    }

    pub fn filter_template(mut self, template: impl Into<String>) -> Self {
        self.filter = Staged::Template(template.into());
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Staged::Value(projection);
        self
    }

    pub fn projection_template(mut self, template: impl Into<String>) -> Self {
        self.projection = Staged::Template(template.into());
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Staged::Value(sort);
        self
    }

    /// Append one sort key to a structured sort.
    pub fn sort_by(mut self, field: impl Into<String>, direction: i32) -> Self {
        let mut sort = match self.sort {
            Staged::Value(sort) => sort,
            Staged::Unset | Staged::Template(_) => Vec::new(),
        };
        sort.push((field.into(), direction));
        self.sort = Staged::Value(sort);
        self
    }

    pub fn sort_template(mut self, template: impl Into<String>) -> Self {
        self.sort = Staged::Template(template.into());
        self
    }

    /// Append the next positional parameter (`?1` for the first call, and so on).
    pub fn bind(mut self, param: impl Serialize) -> Self {
        let position = self.params.len() + 1;
        match serde_json::to_value(param) {
            Ok(value) => self.params.push(value),
            Err(err) => {
                if self.param_error.is_none() {
                    self.param_error = Some(QueryBuildError::new(
                        Clause::Params,
                        format!("parameter ?{} failed to serialize: {}", position, err),
                    ));
                }
                self.params.push(Value::Null);
            }
        }
        self
    }

    /// Zero-based page index. Only applies together with `page_size`.
    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn pageable(self, page: u64, page_size: u64) -> Self {
        self.page(page).page_size(page_size)
    }

    /// Render and parse every clause into a [`QuerySpec`] without running it.
    pub fn build(self) -> Result<QuerySpec, QueryBuildError> {
        self.finish().map(|(_, _, spec)| spec)
    }

    /// First matching record, or `NotFound`.
    pub fn query_one(self) -> Result<R> {
        let (repository, ctx, spec) = self.finish()?;
        repository.query_one(&ctx, &spec)
    }

    pub fn query_many(self) -> Result<Vec<R>> {
        let (repository, ctx, spec) = self.finish()?;
        repository.query_many(&ctx, &spec)
    }

    pub fn count(self) -> Result<u64> {
        let (repository, ctx, spec) = self.finish()?;
        repository.count(&ctx, &spec)
    }

    /// Delete every matching record. Returns the number deleted.
    pub fn delete(self) -> Result<u64> {
        let (repository, ctx, spec) = self.finish()?;
        repository.delete(&ctx, &spec)
    }

    fn finish(self) -> Result<(&'r Repository<R, S, I>, Context, QuerySpec), QueryBuildError> {
        if let Some(err) = self.param_error {
            return Err(err);
        }
        let params = &self.params;

        let filter = self
            .filter
            .resolve(|template| render_document(Clause::Filter, template, params))?
            .unwrap_or_default();
        let projection = self
            .projection
            .resolve(|template| render_document(Clause::Projection, template, params))?;
        let sort = self
            .sort
            .resolve(|template| render_sort(template, params))?;

        let spec = QuerySpec {
            filter,
            projection,
            sort,
            page: self.page,
            page_size: self.page_size,
        };
        Ok((
            self.repository,
            self.context.unwrap_or_default(),
            spec,
        ))
    }
}
