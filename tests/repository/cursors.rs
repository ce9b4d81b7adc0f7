//! Cursor release on every exit path.

use docrepo::{
    Context, DocumentStore, InMemoryDocumentStore, Repository, RepositoryError, StoreError,
};

use crate::support::Person;

#[test]
fn cursor_is_closed_after_a_full_read() {
    let store = InMemoryDocumentStore::new();
    let repo: Repository<Person, _> = Repository::new(store.clone()).unwrap();
    let ctx = Context::background();
    repo.save(&ctx, Person::new("ann", 30)).unwrap();
    repo.save(&ctx, Person::new("bob", 40)).unwrap();

    assert_eq!(repo.find_all(&ctx).unwrap().len(), 2);
    assert_eq!(store.open_cursors(), 0);
}

#[test]
fn cursor_is_closed_when_a_document_fails_to_decode() {
    let store = InMemoryDocumentStore::new();
    let repo: Repository<Person, _> = Repository::new(store.clone()).unwrap();
    let ctx = Context::background();
    repo.save(&ctx, Person::new("ann", 30)).unwrap();
    store
        .insert_one(&ctx, "people", docrepo::doc!({ "name": "broken", "age": "old" }))
        .unwrap();

    let err = repo.find_all(&ctx).unwrap_err();
    assert!(matches!(err, RepositoryError::Store(StoreError::Serde(_))));
    assert_eq!(store.open_cursors(), 0);
}

#[test]
fn cursor_is_closed_when_the_context_is_cancelled_mid_read() {
    let store = InMemoryDocumentStore::new();
    let repo: Repository<Person, _> = Repository::new(store.clone()).unwrap();
    let ctx = Context::background();
    repo.save(&ctx, Person::new("ann", 30)).unwrap();

    let cancelled = Context::cancellable();
    let mut cursor = store
        .find(&cancelled, "people", &Default::default(), &Default::default())
        .unwrap();
    cancelled.cancel();
    assert_eq!(
        docrepo::DocumentCursor::next_document(&mut cursor, &cancelled),
        Err(StoreError::Cancelled)
    );
    docrepo::DocumentCursor::close(&mut cursor);
    assert_eq!(store.open_cursors(), 0);
}

#[test]
fn aggregation_cursors_are_closed() {
    let store = InMemoryDocumentStore::new();
    let repo: Repository<Person, _> = Repository::new(store.clone()).unwrap();
    let ctx = Context::background();
    for (name, age) in [("ann", 30), ("bob", 40)] {
        repo.save(&ctx, Person::new(name, age)).unwrap();
    }

    let first = repo
        .aggregate_one(&ctx, &[docrepo::doc!({ "$sort": { "age": 1 } })])
        .unwrap();
    assert_eq!(first.unwrap()["name"], "ann");
    assert_eq!(store.open_cursors(), 0);

    let all = repo.aggregate_multiple(&ctx, &[]).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(store.open_cursors(), 0);
}
