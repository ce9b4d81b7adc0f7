use std::any::Any;
use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// Types usable as a record's identity field.
///
/// Every identity type has an unset value that tells a new record (insert)
/// apart from an existing one (replace).
pub trait Identity:
    Any + Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned + Send + Sync
{
    /// Whether this value is the unset sentinel.
    fn is_unset(&self) -> bool;

    /// Generate a fresh identifier on the client side.
    fn generate() -> Self;
}

/// Store-assigned document identifier. The nil value means "unset".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// A new random identifier.
    pub fn new() -> Self {
        ObjectId(Uuid::new_v4())
    }

    /// The unset identifier.
    pub const fn nil() -> Self {
        ObjectId(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        ObjectId(uuid)
    }
}

impl FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ObjectId)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl Identity for ObjectId {
    fn is_unset(&self) -> bool {
        self.is_nil()
    }

    fn generate() -> Self {
        ObjectId::new()
    }
}

impl Identity for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }

    fn generate() -> Self {
        Uuid::new_v4().simple().to_string()
    }
}
