//! Records - caller-defined structs stored one per document.
//!
//! A record describes its own shape through [`Record::fields`]: one
//! [`FieldDescriptor`] per field, in declaration order, carrying the stored
//! field name and the raw index annotations. The descriptors are plain data;
//! they are interpreted once, when a repository is constructed.
//!
//! ## Example
//!
//! ```ignore
//! use docrepo::{ObjectId, Record};
//!
//! #[derive(Clone, Serialize, Deserialize, Record)]
//! #[record(collection = "people", compound_index = "{name:1,age:1}")]
//! struct Person {
//!     #[serde(rename = "_id")]
//!     pub id: ObjectId,
//!     #[record(index = "1, unique")]
//!     pub name: String,
//!     pub age: i32,
//! }
//! ```

mod identity;

use std::any::{Any, TypeId};

use serde::{de::DeserializeOwned, Serialize};

pub use identity::{Identity, ObjectId};

/// Stored name that marks a field as the record's identity.
pub const ID_FIELD: &str = "_id";

/// Static description of one record field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Declaration position, used to reach the field through [`Record::field`].
    pub position: usize,
    /// Rust identifier of the field.
    pub ident: &'static str,
    /// Name the field is stored under in a document.
    pub name: &'static str,
    pub type_id: fn() -> TypeId,
    pub type_name: fn() -> &'static str,
    /// Raw `index` annotation, e.g. `"1, unique"`.
    pub index: Option<&'static str>,
    /// Raw `compound_index` annotation, e.g. `"{name:1,age:-1};{age:1}"`.
    pub compound_index: Option<&'static str>,
}

impl FieldDescriptor {
    /// A descriptor with no annotations, for hand-written `Record` impls.
    pub const fn plain<T: Any>(position: usize, ident: &'static str, name: &'static str) -> Self {
        Self {
            position,
            ident,
            name,
            type_id: TypeId::of::<T>,
            type_name: std::any::type_name::<T>,
            index: None,
            compound_index: None,
        }
    }

    pub const fn with_index(mut self, annotation: &'static str) -> Self {
        self.index = Some(annotation);
        self
    }

    pub const fn with_compound_index(mut self, annotation: &'static str) -> Self {
        self.compound_index = Some(annotation);
        self
    }

    pub fn is_identity(&self) -> bool {
        self.name == ID_FIELD
    }
}

/// Trait for types that can be stored as documents.
///
/// Usually derived with `#[derive(Record)]`. Hand-written impls are the
/// explicit schema-registration path and must keep `fields` consistent with
/// `field` / `field_mut`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection name for this record type (e.g., "people", "orders").
    const COLLECTION: &'static str;

    /// Field descriptors in declaration order.
    fn fields() -> &'static [FieldDescriptor];

    /// Type-level compound index annotation, if any.
    fn compound_indexes() -> Option<&'static str> {
        None
    }

    /// Borrow the field at `position`.
    fn field(&self, position: usize) -> Option<&dyn Any>;

    /// Mutably borrow the field at `position`.
    fn field_mut(&mut self, position: usize) -> Option<&mut dyn Any>;
}
