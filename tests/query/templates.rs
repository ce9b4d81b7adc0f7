//! Reusable query templates rendered with fresh parameters.

use docrepo::{Clause, Context, QueryTemplate};
use serde_json::json;

use crate::support::{names, seeded};

#[test]
fn one_template_many_renders() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    let older_than = QueryTemplate::new(r#"{"age": {"$gt": ?1}}"#).sort(r#"[{"age": 1}]"#);

    let spec = older_than.render(&[json!(24)]).unwrap();
    assert_eq!(names(&repo.query_many(&ctx, &spec).unwrap()), vec!["ann", "bob", "cid"]);

    let spec = older_than.render(&[json!(30)]).unwrap();
    assert_eq!(names(&repo.query_many(&ctx, &spec).unwrap()), vec!["cid"]);
}

#[test]
fn paged_template() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    let spec = QueryTemplate::new(r#"{"city": ?1}"#)
        .sort(r#"[{"name": -1}]"#)
        .page(1, 1)
        .render(&[json!("oslo")])
        .unwrap();

    assert_eq!(spec.skip_limit(), Some((1, 1)));
    assert_eq!(names(&repo.query_many(&ctx, &spec).unwrap()), vec!["ann"]);
}

#[test]
fn render_failures_name_the_clause() {
    let template = QueryTemplate::new(r#"{"age": ?1}"#).projection(r#"{"name": ?2}"#);
    let err = template.render(&[json!(1)]).unwrap_err();
    assert_eq!(err.clause, Clause::Projection);
}

#[test]
fn template_without_filter_matches_everything() {
    let (_, repo) = seeded();
    let ctx = Context::background();
    let spec = QueryTemplate::default().render(&[]).unwrap();
    assert!(spec.filter.is_empty());
    assert_eq!(repo.count(&ctx, &spec).unwrap(), 3);
}
