use tracing::debug;

use crate::context::Context;
use crate::store::{DocumentStore, IndexModel, StoreError};

use super::Schema;

/// Create every index declared by `schema` on `collection`.
///
/// Single-field indexes go out as one batched request; each compound index
/// is its own request. The first store error aborts provisioning. Returns
/// the names of the created (or already existing) indexes.
pub fn provision_indexes<S: DocumentStore>(
    store: &S,
    ctx: &Context,
    collection: &str,
    schema: &Schema,
) -> Result<Vec<String>, StoreError> {
    let mut names = Vec::new();

    if !schema.indexes.is_empty() {
        let models: Vec<IndexModel> = schema.indexes.iter().map(|spec| spec.to_model()).collect();
        debug!(collection, count = models.len(), "creating single-field indexes");
        names.extend(store.create_indexes(ctx, collection, &models)?);
    }

    for compound in &schema.compound_indexes {
        let model = compound.to_model();
        debug!(collection, index = %model.name(), "creating compound index");
        names.extend(store.create_indexes(ctx, collection, std::slice::from_ref(&model))?);
    }

    Ok(names)
}
