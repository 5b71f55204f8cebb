#![allow(missing_docs)]

use std::sync::Once;

use objquery::query::recording::RecordingExecutor;
use objquery::query::{Expr, ObjectQuery, Operator, QueryConfig, QueryModifiers, Source, Value};
use objquery::types::{QueryError, Result};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("objquery=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

fn person() -> Source {
    Source::new("Person", "person")
}

#[test]
fn single_source_list_binds_filter_constant() -> Result<()> {
    init_tracing();
    let exec = RecordingExecutor::new();
    exec.push_values(["Ann", "Bob"]);
    let p = person();

    let mut query = ObjectQuery::new(&exec);
    query
        .from([p.clone()])
        .filter(p.prop("age").gt(30))
        .order_by([p.prop("name").asc()])
        .limit(10);
    let names = query.list(p.prop("name"))?;
    assert_eq!(names, vec![Value::from("Ann"), Value::from("Bob")]);

    let recorded = exec.last().expect("one query prepared");
    assert_eq!(recorded.primary_type, "Person");
    assert_eq!(recorded.filter.as_deref(), Some("age > a"));
    assert_eq!(recorded.parameters.as_deref(), Some("Integer a"));
    assert_eq!(recorded.bound, Some(vec![Value::Int(30)]));
    assert_eq!(recorded.result.as_deref(), Some("name"));
    assert_eq!(recorded.ordering.as_deref(), Some("name ascending"));
    assert_eq!(recorded.range, Some((0, 10)));
    assert!(!recorded.unique);
    query.close();
    Ok(())
}

#[test]
fn auxiliary_sources_are_declared_as_variables() -> Result<()> {
    init_tracing();
    let exec = RecordingExecutor::new();
    let p = person();
    let addr = Source::new("Address", "addr");

    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone(), addr.clone()]).filter(
        p.prop("address")
            .eq(addr.expr())
            .and(addr.prop("city").eq("Oslo")),
    );
    query.list(p.expr())?;

    let recorded = exec.last().expect("prepared");
    assert_eq!(recorded.variables.as_deref(), Some("Address addr"));
    assert_eq!(
        recorded.filter.as_deref(),
        Some("address == addr && addr.city == a")
    );
    assert_eq!(recorded.parameters.as_deref(), Some("String a"));
    assert_eq!(recorded.result, None);
    query.close();
    Ok(())
}

#[test]
fn constant_labels_never_shadow_declared_variables() -> Result<()> {
    let exec = RecordingExecutor::new();
    let p = person();
    let a = Source::new("Address", "a");
    let tag = Source::new("Tag", "varp1");

    let mut query = ObjectQuery::new(&exec);
    query
        .from([p.clone(), a.clone(), tag.clone()])
        .filter(p.prop("address").eq(a.expr()).and(a.prop("city").eq("Oslo")));
    query.list(p.prop("age").add(1))?;

    let recorded = exec.last().expect("prepared");
    assert_eq!(recorded.variables.as_deref(), Some("Address a, Tag varp1"));
    assert_eq!(
        recorded.filter.as_deref(),
        Some("address == a && a.city == b")
    );
    assert_eq!(recorded.result.as_deref(), Some("age + varp2"));
    assert_eq!(
        recorded.parameters.as_deref(),
        Some("String b, Integer varp2")
    );
    assert_eq!(
        recorded.bound,
        Some(vec![Value::from("Oslo"), Value::Int(1)])
    );
    query.close();
    Ok(())
}

#[test]
fn parameters_follow_filter_grouping_projection_order() -> Result<()> {
    let exec = RecordingExecutor::new();
    let p = person();

    let mut query = ObjectQuery::new(&exec);
    query
        .from([p.clone()])
        .filter(p.prop("age").gt(30))
        .group_by([p.prop("age").add(5)])
        .having(p.prop("age").count().gt(2))?;
    query.list_many([p.prop("age").add(5), p.prop("age").mul(30)])?;

    let recorded = exec.last().expect("prepared");
    assert_eq!(
        recorded.grouping.as_deref(),
        Some("age + varg1 having count(age) > varg2")
    );
    assert_eq!(recorded.result.as_deref(), Some("age + varp1, age * varp2"));
    assert_eq!(
        recorded.parameters.as_deref(),
        Some("Integer a, Integer varg1, Integer varg2, Integer varp1, Integer varp2")
    );
    assert_eq!(
        recorded.bound,
        Some(vec![
            Value::Int(30),
            Value::Int(5),
            Value::Int(2),
            Value::Int(5),
            Value::Int(30),
        ])
    );
    query.close();
    Ok(())
}

#[test]
fn distinct_count_carries_no_row_clauses() -> Result<()> {
    let exec = RecordingExecutor::new();
    exec.push_count(7);
    let p = person();

    let mut query = ObjectQuery::new(&exec);
    query
        .from([p.clone()])
        .distinct()
        .order_by([p.prop("name").desc()])
        .project([p.prop("name")])
        .limit(5);
    assert_eq!(query.count()?, 7);

    let recorded = exec.last().expect("prepared");
    assert_eq!(recorded.result.as_deref(), Some("distinct count(this)"));
    assert_eq!(recorded.range, None);
    assert_eq!(recorded.ordering, None);
    assert_eq!(recorded.parameters, None);
    assert!(recorded.unique);
    query.close();
    Ok(())
}

#[test]
fn grouping_constants_follow_filter_constants() -> Result<()> {
    let exec = RecordingExecutor::new();
    exec.push_rows(vec![vec![Value::from("Oslo"), Value::Long(4)]]);
    let p = person();

    let mut query = ObjectQuery::new(&exec);
    query
        .from([p.clone()])
        .filter(p.prop("age").gt(30))
        .group_by([p.prop("city")])
        .having(p.prop("age").count().gt(2))?;
    let rows = query.list_many([p.prop("city"), p.prop("age").count()])?;
    assert_eq!(rows.len(), 1);

    let recorded = exec.last().expect("prepared");
    assert_eq!(
        recorded.grouping.as_deref(),
        Some("city having count(age) > varg1")
    );
    assert_eq!(recorded.result.as_deref(), Some("city, count(age)"));
    assert_eq!(
        recorded.parameters.as_deref(),
        Some("Integer a, Integer varg1")
    );
    assert_eq!(recorded.bound, Some(vec![Value::Int(30), Value::Int(2)]));
    query.close();
    Ok(())
}

#[test]
fn constructor_projection_is_flattened() -> Result<()> {
    let exec = RecordingExecutor::new();
    exec.push_rows(vec![vec![
        Value::from("Ann"),
        Value::Int(41),
        Value::from("ann@example.org"),
    ]]);
    let p = person();

    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).project([Expr::constructor(
        "PersonSummary",
        vec![p.prop("name"), p.prop("age"), p.prop("email")],
    )]);
    let rows = query.list_many(Vec::<Expr>::new())?;
    assert_eq!(rows[0].len(), 3);

    let recorded = exec.last().expect("prepared");
    assert_eq!(recorded.result.as_deref(), Some("name, age, email"));
    query.close();
    Ok(())
}

#[test]
fn pagination_maps_to_half_open_ranges() -> Result<()> {
    let exec = RecordingExecutor::new();
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]);

    query.restrict(QueryModifiers::limit(5).with_offset(10));
    query.list(p.expr())?;
    query.restrict(QueryModifiers::limit(5));
    query.list(p.expr())?;
    query.restrict(QueryModifiers::default());
    query.list(p.expr())?;

    let ranges: Vec<_> = exec.prepared().into_iter().map(|q| q.range).collect();
    assert_eq!(ranges, vec![Some((10, 15)), Some((0, 5)), None]);
    query.close();
    Ok(())
}

#[test]
fn repeated_list_is_idempotent_and_close_releases_all() -> Result<()> {
    let exec = RecordingExecutor::new();
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).filter(p.prop("age").ge(18));

    query.list(p.prop("name"))?;
    query.list(p.prop("name"))?;
    assert_eq!(query.open_handles(), 2);

    let prepared = exec.prepared();
    assert_eq!(prepared[0].result, prepared[1].result);
    assert_eq!(prepared[0].filter, prepared[1].filter);
    assert_eq!(prepared[0].bound, prepared[1].bound);

    query.close();
    assert_eq!(query.open_handles(), 0);
    assert!(exec.prepared().iter().all(|q| q.closes == 1));
    Ok(())
}

#[test]
fn dropping_an_open_query_releases_its_handles() -> Result<()> {
    init_tracing();
    let exec = RecordingExecutor::new();
    exec.push_count(3);
    let p = person();
    {
        let mut query = ObjectQuery::new(&exec);
        query.from([p.clone()]);
        assert_eq!(query.count()?, 3);
    }
    assert_eq!(exec.prepared()[0].closes, 1);
    Ok(())
}

#[test]
fn unique_result_enforces_cardinality() -> Result<()> {
    let exec = RecordingExecutor::new();
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).filter(p.prop("email").eq("ann@example.org"));

    exec.push_unique(Some(vec![Value::from("Ann")]));
    assert_eq!(query.unique_result(p.prop("name"))?, Some(Value::from("Ann")));

    exec.push_unique(None);
    assert_eq!(query.unique_result(p.prop("name"))?, None);

    exec.push_values(["Ann", "Anna"]);
    let err = query
        .unique_result(p.prop("name"))
        .expect_err("two rows for a unique query");
    assert!(matches!(err, QueryError::CardinalityViolation { rows: 2 }));

    let recorded = exec.last().expect("prepared");
    assert!(recorded.unique);
    assert_eq!(recorded.range, Some((0, 1)));
    query.close();
    Ok(())
}

#[test]
fn executor_failures_propagate_and_keep_the_handle() {
    let exec = RecordingExecutor::new();
    exec.push_failure("unknown field 'agee'");
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).filter(p.prop("agee").gt(1));

    let err = query.list(p.expr()).expect_err("scripted failure");
    assert_eq!(err.code(), "ExecutionFailure");
    assert!(err.to_string().contains("unknown field 'agee'"));
    assert_eq!(query.open_handles(), 1);

    query.close();
    assert_eq!(exec.prepared()[0].closes, 1);
}

#[test]
fn having_requires_grouping() {
    let exec = RecordingExecutor::new();
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]);
    let err = query
        .having(p.prop("age").count().gt(1))
        .err()
        .expect("having without group by");
    assert!(matches!(err, QueryError::InvalidMetadata(_)));
}

#[test]
fn queries_without_constants_execute_unbound() -> Result<()> {
    let exec = RecordingExecutor::new();
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query
        .from([p.clone()])
        .filter(p.prop("email").is_not_null().and(p.prop("nickname").eq(Value::Null)));
    query.list(p.prop("name"))?;

    let recorded = exec.last().expect("prepared");
    assert_eq!(
        recorded.filter.as_deref(),
        Some("email != null && nickname == null")
    );
    assert_eq!(recorded.parameters, None);
    assert_eq!(recorded.bound, None);
    assert_eq!(recorded.executions, 1);
    query.close();
    Ok(())
}

#[test]
fn order_by_constants_are_rejected() {
    let exec = RecordingExecutor::new();
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).order_by([p.prop("age").add(1).asc()]);

    let err = query.list(p.expr()).expect_err("constant in ordering");
    assert!(matches!(err, QueryError::Unsupported(_)));
    assert!(exec.prepared().is_empty());
}

#[test]
fn configured_templates_change_rendering() -> Result<()> {
    let exec = RecordingExecutor::new();
    let config = QueryConfig::default().with_template(Operator::Matches, "{0}.like({1})")?;
    let p = person();
    let mut query = ObjectQuery::with_config(&exec, config);
    query
        .from([p.clone()])
        .filter(Expr::op(Operator::Matches, vec![p.prop("name"), "J%".into()]));
    exec.push_count(1);
    assert_eq!(query.count()?, 1);

    let recorded = exec.last().expect("prepared");
    assert_eq!(recorded.filter.as_deref(), Some("name.like(a)"));
    query.close();
    Ok(())
}

#[test]
fn clear_resets_clauses_but_keeps_sources() -> Result<()> {
    let exec = RecordingExecutor::new();
    let p = person();
    let mut query = ObjectQuery::new(&exec);
    query.from([p.clone()]).filter(p.prop("age").gt(30)).limit(3);
    query.clear();
    query.list(p.expr())?;

    let recorded = exec.last().expect("prepared");
    assert_eq!(recorded.primary_type, "Person");
    assert_eq!(recorded.filter, None);
    assert_eq!(recorded.range, None);
    query.close();
    Ok(())
}
