//! Identity resolution through the derived field accessors.

use docrepo::{Context, InMemoryDocumentStore, ObjectId, Record, Repository, Schema};

use crate::support::{Person, Tag};

#[test]
fn locator_points_at_the_renamed_field() {
    let schema = Schema::read::<Person>().unwrap();
    assert_eq!(schema.identity.ident(), "id");
    assert_eq!(schema.identity.position(), 0);
}

#[test]
fn locator_reads_and_writes_the_identity() {
    let schema = Schema::read::<Person>().unwrap();
    let mut person = Person::new("ann", 30);

    let fresh = ObjectId::new();
    assert!(schema.identity.set::<Person, ObjectId>(&mut person, fresh));
    assert_eq!(schema.identity.get::<Person, ObjectId>(&person), Some(&fresh));
    assert_eq!(person.id, fresh);
}

#[test]
fn locator_refuses_the_wrong_identity_type() {
    let schema = Schema::read::<Tag>().unwrap();
    let mut tag = Tag::new("rust", "Rust");

    assert!(schema.identity.get::<Tag, ObjectId>(&tag).is_none());
    assert!(!schema.identity.set::<Tag, ObjectId>(&mut tag, ObjectId::new()));
    assert_eq!(tag.slug, "rust");
}

#[test]
fn derived_descriptors_use_stored_names() {
    let names: Vec<&str> = Person::fields().iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["_id", "name", "age", "email"]);
    assert_eq!(Person::COLLECTION, "people");
    assert_eq!(Tag::COLLECTION, "tags");
}

#[test]
fn stored_identity_is_the_document_id() {
    let store = InMemoryDocumentStore::new();
    let repo: Repository<Person, _> = Repository::new(store.clone()).unwrap();
    let ctx = Context::background();

    let ann = repo.save(&ctx, Person::new("ann", 30)).unwrap();
    let raw = repo
        .filter_one(
            &ctx,
            &docrepo::doc!({ "_id": ann.id }),
            &Default::default(),
        )
        .unwrap();
    assert_eq!(raw, ann);
}
