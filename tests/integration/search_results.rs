#![allow(missing_docs)]

use objquery::query::recording::RecordingExecutor;
use objquery::query::{ObjectQuery, QueryModifiers, Source, Value};
use objquery::types::{QueryError, Result};

fn person() -> Source {
    Source::new("Person", "person")
}

#[test]
fn zero_total_skips_the_page_query() -> Result<()> {
    let exec = RecordingExecutor::new();
    exec.push_count(0);
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).filter(p.prop("age").gt(200)).limit(10);

    let page = query.list_results(p.prop("name"))?;
    assert!(page.is_empty());
    assert!(page.results().is_empty());
    assert_eq!(page.modifiers(), QueryModifiers::default());
    assert_eq!(exec.prepared().len(), 1);
    query.close();
    Ok(())
}

#[test]
fn page_carries_total_and_modifiers() -> Result<()> {
    let exec = RecordingExecutor::new();
    exec.push_count(12);
    exec.push_values(["Eve", "Finn"]);
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query
        .from([p.clone()])
        .filter(p.prop("age").gt(30))
        .order_by([p.prop("name").asc()])
        .restrict(QueryModifiers::limit(2).with_offset(4));

    let page = query.list_results(p.prop("name"))?;
    assert_eq!(page.total(), 12);
    assert_eq!(page.modifiers(), QueryModifiers::limit(2).with_offset(4));
    assert_eq!(page.results(), &[Value::from("Eve"), Value::from("Finn")]);

    let prepared = exec.prepared();
    assert_eq!(prepared.len(), 2);
    assert_eq!(prepared[0].result.as_deref(), Some("count(this)"));
    assert_eq!(prepared[0].range, None);
    assert_eq!(prepared[0].ordering, None);
    assert_eq!(prepared[1].result.as_deref(), Some("name"));
    assert_eq!(prepared[1].range, Some((4, 6)));
    assert_eq!(prepared[1].ordering.as_deref(), Some("name ascending"));
    assert_eq!(prepared[0].bound, prepared[1].bound);
    query.close();
    Ok(())
}

#[test]
fn distinct_is_honoured_by_the_count() -> Result<()> {
    let exec = RecordingExecutor::new();
    exec.push_count(1);
    exec.push_values(["Oslo"]);
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).distinct();

    let page = query.list_results(p.prop("city"))?;
    assert_eq!(page.total(), 1);
    let prepared = exec.prepared();
    assert_eq!(prepared[0].result.as_deref(), Some("distinct count(this)"));
    assert_eq!(prepared[1].result.as_deref(), Some("distinct city"));
    query.close();
    Ok(())
}

#[test]
fn count_failure_aborts_before_paging() {
    let exec = RecordingExecutor::new();
    exec.push_failure("engine offline");
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]);

    let err = query
        .list_results(p.prop("name"))
        .expect_err("count failed");
    assert!(matches!(err, QueryError::Execution(_)));
    assert_eq!(exec.prepared().len(), 1);
    query.close();
}

#[test]
fn page_serializes_to_json() -> Result<()> {
    let exec = RecordingExecutor::new();
    exec.push_count(1);
    exec.push_values([7]);
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).limit(1);

    let page = query.list_results(p.prop("age"))?;
    let json = serde_json::to_value(&page).expect("serialize page");
    assert_eq!(json["total"], 1);
    assert_eq!(json["modifiers"]["limit"], 1);
    assert_eq!(json["results"][0]["v"], 7);
    query.close();
    Ok(())
}
