use thiserror::Error;

use crate::query::QueryBuildError;
use crate::schema::SchemaError;
use crate::store::StoreError;

/// Error returned by repository construction and every repository operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The record type's declared schema is invalid. Construction only.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The store rejected an index-creation request. Construction only.
    #[error("index provisioning failed: {0}")]
    IndexProvision(#[source] StoreError),
    /// A query clause failed to render or parse; nothing was executed.
    #[error(transparent)]
    QueryBuild(#[from] QueryBuildError),
    /// The store failed the operation, including document decode failures.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A single-result lookup matched no document.
    #[error("no document in {collection} matches {filter}")]
    NotFound { collection: String, filter: String },
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

pub type Result<T, E = RepositoryError> = std::result::Result<T, E>;
