//! Record types with valid and invalid schema annotations.

#![allow(dead_code)]

use docrepo::{FieldDescriptor, ObjectId, Record};
use serde::{Deserialize, Serialize};
use std::any::Any;

#[derive(Clone, Debug, Serialize, Deserialize, Record)]
#[record(collection = "accounts", compound_index = "{owner:1,opened_at:-1};{region:1}")]
pub struct Account {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[record(index = "1")]
    pub owner: String,
    #[record(index = "-1, unique")]
    pub number: String,
    #[record(index = "text")]
    pub notes: String,
    #[record(index = "2dsphere, sparse")]
    pub location: Option<(f64, f64)>,
    pub opened_at: u64,
    pub region: String,
}

/// No field is stored as `_id`.
#[derive(Clone, Debug, Serialize, Deserialize, Record)]
pub struct Anonymous {
    pub id: ObjectId,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Record)]
pub struct Fruity {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[record(index = "1, banana")]
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Record)]
pub struct Undecided {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[record(index = "1, -1")]
    pub rank: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Record)]
pub struct Lopsided {
    #[serde(rename = "_id")]
    #[record(compound_index = "{name:1,age}")]
    pub id: ObjectId,
    pub name: String,
    pub age: u32,
}

/// Two fields stored as `_id`; the first one wins.
#[derive(Clone, Debug, Serialize, Deserialize, Record)]
pub struct Doubled {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename(serialize = "_id"), skip_deserializing)]
    pub shadow: String,
}

/// A record without any index annotations.
#[derive(Clone, Debug, Serialize, Deserialize, Record)]
pub struct Note {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub body: String,
}

/// Stored field names come from the container's `rename_all`.
#[derive(Clone, Debug, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[record(index = "1, unique")]
    pub created_at: u64,
    #[record(index = "-1")]
    pub sensor_name: String,
}

/// Registered by hand instead of derived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    #[serde(rename = "_id")]
    pub sku: String,
    pub color: String,
}

impl Record for Widget {
    const COLLECTION: &'static str = "widgets";

    fn fields() -> &'static [FieldDescriptor] {
        const FIELDS: &[FieldDescriptor] = &[
            FieldDescriptor::plain::<String>(0, "sku", "_id"),
            FieldDescriptor::plain::<String>(1, "color", "color").with_index("1"),
        ];
        FIELDS
    }

    fn field(&self, position: usize) -> Option<&dyn Any> {
        match position {
            0 => Some(&self.sku),
            1 => Some(&self.color),
            _ => None,
        }
    }

    fn field_mut(&mut self, position: usize) -> Option<&mut dyn Any> {
        match position {
            0 => Some(&mut self.sku),
            1 => Some(&mut self.color),
            _ => None,
        }
    }
}
