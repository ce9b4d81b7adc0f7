//! The fluent query builder: structured and templated clauses.

use docrepo::{doc, Clause, Context, QueryBuildError, RepositoryError};
use serde::{Serialize, Serializer};
use serde_json::json;

use crate::support::{names, seeded, NameOnly};

#[test]
fn templated_and_structured_filters_agree() {
    let (_, repo) = seeded();

    let templated = repo
        .query()
        .filter_template(r#"{"age": {"$gte": ?1}}"#)
        .bind(30)
        .sort_by("age", 1)
        .query_many()
        .unwrap();
    let structured = repo
        .query()
        .filter(doc!({ "age": { "$gte": 30 } }))
        .sort_by("age", 1)
        .query_many()
        .unwrap();

    assert_eq!(templated, structured);
    assert_eq!(names(&templated), vec!["bob", "cid"]);
}

#[test]
fn sorted_descending_by_template() {
    let (_, repo) = seeded();
    let found = repo
        .query()
        .filter_template(r#"{"age": {"$gte": ?1}}"#)
        .sort_template(r#"[{"age": ?2}]"#)
        .bind(30)
        .bind(-1)
        .query_many()
        .unwrap();
    assert_eq!(names(&found), vec!["cid", "bob"]);
}

#[test]
fn string_parameters_are_quoted() {
    let (_, repo) = seeded();
    let found = repo
        .query()
        .filter_template(r#"{"city": ?1, "age": {"$lt": ?2}}"#)
        .bind("oslo")
        .bind(30)
        .query_one()
        .unwrap();
    assert_eq!(found.name, "ann");
}

#[test]
fn structured_parameters_render_as_json() {
    let (_, repo) = seeded();
    let found = repo
        .query()
        .filter_template(r#"{"name": {"$in": ?1}}"#)
        .bind(["ann", "cid"])
        .sort(vec![("name".to_string(), -1)])
        .query_many()
        .unwrap();
    assert_eq!(names(&found), vec!["cid", "ann"]);
}

#[test]
fn builder_pagination_uses_page_arithmetic() {
    let (_, repo) = seeded();

    let spec = repo.query().pageable(1, 5).build().unwrap();
    assert_eq!(spec.skip_limit(), Some((5, 5)));
    let spec = repo.query().page(0).page_size(5).build().unwrap();
    assert_eq!(spec.skip_limit(), Some((0, 5)));

    let page = repo
        .query()
        .sort_by("age", 1)
        .pageable(1, 1)
        .query_many()
        .unwrap();
    assert_eq!(names(&page), vec!["bob"]);

    let only_size = repo.query().page_size(1).query_many().unwrap();
    assert_eq!(only_size.len(), 3);
}

#[test]
fn count_and_delete_through_the_builder() {
    let (_, repo) = seeded();

    let oslo = repo
        .query()
        .filter_template(r#"{"city": ?1}"#)
        .bind("oslo")
        .count()
        .unwrap();
    assert_eq!(oslo, 2);

    let deleted = repo
        .query()
        .filter(doc!({ "age": { "$lt": 30 } }))
        .delete()
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(repo.query().count().unwrap(), 2);
}

#[test]
fn projection_template_limits_returned_fields() {
    let (store, repo) = seeded();
    let ctx = Context::background();

    let spec = repo
        .query()
        .filter_template(r#"{"name": ?1}"#)
        .projection_template(r#"{"name": ?2, "_id": 0}"#)
        .bind("bob")
        .bind(1)
        .build()
        .unwrap();
    assert_eq!(spec.projection, Some(doc!({ "name": 1, "_id": 0 })));

    let raw = docrepo::DocumentStore::find_one(
        &store,
        &ctx,
        repo.collection(),
        &spec.filter,
        &spec.find_options(),
    )
    .unwrap()
    .unwrap();
    let projected: NameOnly = serde_json::from_value(serde_json::Value::Object(raw)).unwrap();
    assert_eq!(projected, NameOnly { name: "bob".into() });

    // A projected document no longer decodes into the full record.
    let err = repo
        .query()
        .filter(spec.filter.clone())
        .projection(doc!({ "name": 1 }))
        .query_one()
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Store(docrepo::StoreError::Serde(_))));
}

#[test]
fn malformed_filter_template_is_a_build_error() {
    let (_, repo) = seeded();
    let err = repo
        .query()
        .filter_template(r#"{"age": {"$gte": ?1}"#)
        .bind(30)
        .query_many()
        .unwrap_err();

    match err {
        RepositoryError::QueryBuild(QueryBuildError { clause, .. }) => {
            assert_eq!(clause, Clause::Filter)
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_parameter_is_a_build_error() {
    let (_, repo) = seeded();
    let err = repo
        .query()
        .filter_template(r#"{"age": ?1, "city": ?2}"#)
        .bind(30)
        .count()
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::QueryBuild(QueryBuildError { clause: Clause::Filter, ref reason })
            if reason.contains("?2")
    ));
}

#[test]
fn non_integer_sort_direction_is_a_build_error() {
    let (_, repo) = seeded();
    let err = repo
        .query()
        .sort_template(r#"[{"age": ?1}]"#)
        .bind("descending")
        .query_many()
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::QueryBuild(QueryBuildError { clause: Clause::Sort, .. })
    ));
}

#[test]
fn malformed_projection_is_a_build_error() {
    let (_, repo) = seeded();
    let err = repo
        .query()
        .projection_template("[1]")
        .build()
        .unwrap_err();
    assert_eq!(err.clause, Clause::Projection);
}

struct Unserializable;

impl Serialize for Unserializable {
    fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
        Err(serde::ser::Error::custom("not today"))
    }
}

#[test]
fn unserializable_parameter_is_a_build_error() {
    let (_, repo) = seeded();
    let err = repo
        .query()
        .filter_template(r#"{"name": ?1}"#)
        .bind(Unserializable)
        .build()
        .unwrap_err();
    assert_eq!(err.clause, Clause::Params);
    assert!(err.reason.contains("?1"));
}

#[test]
fn build_errors_execute_nothing() {
    let (_, repo) = seeded();
    let err = repo
        .query()
        .filter_template(r#"{"city": ?1"#)
        .bind("oslo")
        .delete()
        .unwrap_err();
    assert!(matches!(err, RepositoryError::QueryBuild(_)));
    assert_eq!(repo.query().count().unwrap(), 3);
}

#[test]
fn builder_context_is_honored() {
    let (_, repo) = seeded();
    let ctx = Context::cancellable();
    ctx.cancel();

    let err = repo.query().context(ctx).query_many().unwrap_err();
    assert_eq!(err, RepositoryError::Store(docrepo::StoreError::Cancelled));
}

#[test]
fn later_clauses_replace_earlier_ones() {
    let (_, repo) = seeded();
    let spec = repo
        .query()
        .filter_template(r#"{"name": ?1}"#)
        .filter(doc!({ "city": "rome" }))
        .bind("ignored")
        .build()
        .unwrap();
    assert_eq!(json!(spec.filter), json!({ "city": "rome" }));
}
