//! Test records for repository integration tests.

#![allow(dead_code)]

use docrepo::{ObjectId, Record};
use serde::{Deserialize, Serialize};

/// A person keyed by a store-assigned ObjectId.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Record)]
#[record(collection = "people")]
pub struct Person {
    #[serde(rename = "_id")]
    #[record(compound_index = "{name:1,age:-1}")]
    pub id: ObjectId,
    #[record(index = "1")]
    pub name: String,
    pub age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[record(index = "1, unique, sparse")]
    pub email: Option<String>,
}

impl Person {
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            id: ObjectId::nil(),
            name: name.to_string(),
            age,
            email: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

/// A tag keyed by a caller-chosen slug.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Record)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub slug: String,
    pub label: String,
}

impl Tag {
    pub fn new(slug: &str, label: &str) -> Self {
        Self {
            slug: slug.to_string(),
            label: label.to_string(),
        }
    }
}
