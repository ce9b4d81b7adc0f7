use std::any::TypeId;

use crate::record::{FieldDescriptor, Identity, Record};

use super::SchemaError;

/// Where a record keeps its identity. Resolved once per repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityLocator {
    position: usize,
    ident: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl IdentityLocator {
    pub(crate) fn from_descriptor(field: &FieldDescriptor) -> Self {
        Self {
            position: field.position,
            ident: field.ident,
            type_id: (field.type_id)(),
            type_name: (field.type_name)(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn ident(&self) -> &'static str {
        self.ident
    }

    /// Check that the identity field is declared with type `I`.
    pub fn expect_type<I: Identity>(&self) -> Result<(), SchemaError> {
        if self.type_id == TypeId::of::<I>() {
            Ok(())
        } else {
            Err(SchemaError::IdentityType {
                field: self.ident,
                expected: std::any::type_name::<I>(),
                actual: self.type_name,
            })
        }
    }

    /// Read the identity of `record`.
    ///
    /// Returns `None` only when the record's `field` impl disagrees with its
    /// descriptors, which `expect_type` plus the derive rule out.
    pub fn get<'a, R: Record, I: Identity>(&self, record: &'a R) -> Option<&'a I> {
        record.field(self.position)?.downcast_ref::<I>()
    }

    /// Overwrite the identity of `record`. Returns `false` when the field cannot
    /// be reached as an `I`.
    pub fn set<R: Record, I: Identity>(&self, record: &mut R, id: I) -> bool {
        match record
            .field_mut(self.position)
            .and_then(|field| field.downcast_mut::<I>())
        {
            Some(slot) => {
                *slot = id;
                true
            }
            None => false,
        }
    }
}
