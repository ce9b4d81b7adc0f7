mod record;

use proc_macro::TokenStream;

/// Derive macro for the `Record` trait.
///
/// # Usage
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Record)]
/// #[record(collection = "people", compound_index = "{name:1,age:-1}")]
/// struct Person {
///     #[serde(rename = "_id")]
///     pub id: ObjectId,
///     #[record(index = "1, unique")]
///     pub email: String,
///     #[record(index = "-1")]
///     pub age: i32,
/// }
/// ```
///
/// - `#[record(collection = "...")]` sets the collection name.
///   If omitted, defaults to snake_case struct name + "s".
/// - `#[record(compound_index = "...")]` declares compound indexes, either on the
///   struct or on any field (conventionally the identity field).
/// - `#[record(index = "...")]` declares a single-field index.
/// - The identity field is the first field stored as `_id`
///   (`#[serde(rename = "_id")]`).
///
/// Annotation text is recorded verbatim. It is validated when a repository is
/// constructed, not at compile time.
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    record::derive_record(input)
}
