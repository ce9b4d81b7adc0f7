//! Queries - filter, projection, sort, and pagination bundles.
//!
//! A [`QuerySpec`] is plain data ready for execution. It is produced either
//! directly, by a [`QueryBuilder`] (structured values or templates with `?N`
//! placeholders), or by rendering a reusable [`QueryTemplate`].

mod builder;
mod template;

use std::fmt;

use thiserror::Error;

use crate::store::{Document, FindOptions};

pub use builder::QueryBuilder;
pub use template::{parse_document, parse_sort, render_template, QueryTemplate};

/// Ordered `(field, direction)` pairs; `1` ascending, `-1` descending.
pub type SortSpec = Vec<(String, i32)>;

/// The part of a query that failed to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Filter,
    Projection,
    Sort,
    /// A bound parameter could not be serialized.
    Params,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Filter => write!(f, "filter"),
            Clause::Projection => write!(f, "projection"),
            Clause::Sort => write!(f, "sort"),
            Clause::Params => write!(f, "params"),
        }
    }
}

/// A query clause failed to render or parse. Nothing was executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {clause} clause: {reason}")]
pub struct QueryBuildError {
    pub clause: Clause,
    pub reason: String,
}

impl QueryBuildError {
    pub(crate) fn new(clause: Clause, reason: impl Into<String>) -> Self {
        Self {
            clause,
            reason: reason.into(),
        }
    }
}

/// A ready-to-execute query.
///
/// An empty filter matches every document. Pagination applies only when both
/// `page` and a non-zero `page_size` are set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    pub filter: Document,
    pub projection: Option<Document>,
    pub sort: Option<SortSpec>,
    /// Zero-based page index.
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl QuerySpec {
    /// A query matching `filter` with no projection, sort, or pagination.
    pub fn matching(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// `(skip, limit)` for the configured page: skip = page * size, limit = size.
    pub fn skip_limit(&self) -> Option<(u64, u64)> {
        match (self.page, self.page_size) {
            (Some(page), Some(size)) if size > 0 => Some((page.saturating_mul(size), size)),
            _ => None,
        }
    }

    /// Store options for executing this query.
    pub fn find_options(&self) -> FindOptions {
        let (skip, limit) = match self.skip_limit() {
            Some((skip, limit)) => (Some(skip), Some(limit)),
            None => (None, None),
        };
        FindOptions {
            projection: self.projection.clone(),
            sort: self.sort.clone().unwrap_or_default(),
            skip,
            limit,
        }
    }
}
