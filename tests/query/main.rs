//! Integration tests for query specs, the fluent builder, and aggregation.

mod builder;
mod templates;

use docrepo::{doc, Context, FindOptions, InMemoryDocumentStore, QuerySpec};
use support::{members, names, seeded, Member};

#[test]
fn adults_are_queried_counted_and_deleted() {
    let store = InMemoryDocumentStore::new();
    let repo = members(&store);
    let ctx = Context::background();
    for (name, age) in [("ann", 25), ("bob", 30), ("cid", 35)] {
        repo.save(&ctx, Member::new(name, age, "oslo")).unwrap();
    }

    let adults = QuerySpec {
        filter: doc!({ "age": { "$gte": 30 } }),
        sort: Some(vec![("age".to_string(), 1)]),
        ..QuerySpec::default()
    };
    let found = repo.query_many(&ctx, &adults).unwrap();
    let ages: Vec<u32> = found.iter().map(|m| m.age).collect();
    assert_eq!(ages, vec![30, 35]);

    assert_eq!(repo.count(&ctx, &adults).unwrap(), 2);
    assert_eq!(repo.delete(&ctx, &adults).unwrap(), 2);
    assert_eq!(repo.count_all(&ctx).unwrap(), 1);
    assert_eq!(repo.find_all(&ctx).unwrap()[0].age, 25);
}

#[test]
fn structured_spec_filters_sorts_and_pages() {
    let (_, repo) = seeded();
    let ctx = Context::background();

    let spec = QuerySpec {
        filter: doc!({ "age": { "$gte": 30 } }),
        sort: Some(vec![("age".to_string(), -1)]),
        ..QuerySpec::default()
    };
    assert_eq!(names(&repo.query_many(&ctx, &spec).unwrap()), vec!["cid", "bob"]);

    let first_page = QuerySpec {
        filter: doc!({}),
        sort: Some(vec![("age".to_string(), 1)]),
        page: Some(0),
        page_size: Some(2),
        ..QuerySpec::default()
    };
    assert_eq!(names(&repo.query_many(&ctx, &first_page).unwrap()), vec!["ann", "bob"]);

    let second_page = QuerySpec {
        page: Some(1),
        ..first_page
    };
    assert_eq!(names(&repo.query_many(&ctx, &second_page).unwrap()), vec!["cid"]);
}

#[test]
fn empty_filter_matches_everything() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    assert_eq!(repo.query_many(&ctx, &QuerySpec::default()).unwrap().len(), 3);
    assert_eq!(repo.count(&ctx, &QuerySpec::default()).unwrap(), 3);
}

#[test]
fn half_a_page_returns_everything() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    let spec = QuerySpec {
        page: Some(1),
        ..QuerySpec::default()
    };
    assert_eq!(repo.query_many(&ctx, &spec).unwrap().len(), 3);
}

#[test]
fn query_one_distinguishes_not_found() {
    let (_, repo) = seeded();
    let ctx = Context::background();

    let bob = repo
        .query_one(&ctx, &QuerySpec::matching(doc!({ "name": "bob" })))
        .unwrap();
    assert_eq!(bob.age, 30);

    let err = repo
        .query_one(&ctx, &QuerySpec::matching(doc!({ "name": "zed" })))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn count_and_delete_by_spec() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    let oslo = QuerySpec::matching(doc!({ "city": "oslo" }));

    assert_eq!(repo.count(&ctx, &oslo).unwrap(), 2);
    assert_eq!(repo.delete(&ctx, &oslo).unwrap(), 2);
    assert_eq!(repo.count_all(&ctx).unwrap(), 1);
    assert_eq!(repo.delete(&ctx, &oslo).unwrap(), 0);
}

#[test]
fn array_fields_match_any_element() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    let admins = repo
        .query_many(
            &ctx,
            &QuerySpec {
                filter: doc!({ "tags": "admin" }),
                sort: Some(vec![("name".to_string(), 1)]),
                ..QuerySpec::default()
            },
        )
        .unwrap();
    assert_eq!(names(&admins), vec!["ann", "cid"]);
}

#[test]
fn filter_many_takes_raw_find_options() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    let options = FindOptions {
        sort: vec![("age".to_string(), -1)],
        limit: Some(1),
        ..FindOptions::default()
    };
    let oldest = repo.filter_many(&ctx, &doc!({}), &options).unwrap();
    assert_eq!(names(&oldest), vec!["cid"]);

    let youngest: Member = repo
        .filter_one(
            &ctx,
            &doc!({}),
            &FindOptions {
                sort: vec![("age".to_string(), 1)],
                ..FindOptions::default()
            },
        )
        .unwrap();
    assert_eq!(youngest.name, "ann");
}

#[test]
fn invalid_sort_direction_is_a_store_error() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    let spec = QuerySpec {
        sort: Some(vec![("age".to_string(), 2)]),
        ..QuerySpec::default()
    };
    assert!(matches!(
        repo.query_many(&ctx, &spec),
        Err(docrepo::RepositoryError::Store(docrepo::StoreError::InvalidQuery(_)))
    ));
}
