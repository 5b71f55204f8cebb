#![allow(missing_docs)]

use objquery::query::constants::LabelScheme;
use objquery::query::recording::RecordingExecutor;
use objquery::query::{Expr, ObjectQuery, QueryMode, QueryModifiers, Source, Value};
use proptest::prelude::*;

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Int),
        any::<i64>().prop_map(Value::Long),
        any::<bool>().prop_map(Value::Bool),
        "[a-z]{1,6}".prop_map(Value::String),
    ]
}

fn conjunction(source: &Source, terms: &[(u8, Value)]) -> Option<Expr> {
    terms
        .iter()
        .map(|(field, value)| source.prop(format!("f{field}")).eq(value.clone()))
        .reduce(|lhs, rhs| lhs.and(rhs))
}

fn first_seen(terms: &[(u8, Value)]) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::new();
    for (_, value) in terms {
        if !seen.contains(value) {
            seen.push(value.clone());
        }
    }
    seen
}

fn expected_parameters(passes: [(&[(u8, Value)], LabelScheme); 3]) -> Vec<(String, Value)> {
    let mut expected = Vec::new();
    for (terms, scheme) in passes {
        for (idx, value) in first_seen(terms).into_iter().enumerate() {
            expected.push((scheme.label(idx), value));
        }
    }
    expected
}

fn identifiers(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect()
}

proptest! {
    #[test]
    fn declared_parameters_align_with_bound_values(
        filter_terms in prop::collection::vec((0u8..4, arb_value()), 0..30),
        group_terms in prop::collection::vec((0u8..4, arb_value()), 0..6),
        projection_terms in prop::collection::vec((0u8..4, arb_value()), 0..6),
    ) {
        let p = Source::new("Person", "person");
        let exec = RecordingExecutor::new();
        let mut query = ObjectQuery::new(&exec);
        query.from([p.clone()]);
        if let Some(filter) = conjunction(&p, &filter_terms) {
            query.filter(filter);
        }
        query.group_by(
            group_terms
                .iter()
                .map(|(field, value)| p.prop(format!("g{field}")).add(value.clone())),
        );
        let projection: Vec<Expr> = projection_terms
            .iter()
            .map(|(field, value)| p.prop(format!("f{field}")).mul(value.clone()))
            .collect();

        let plan = query
            .plan(&projection, QueryMode::List(QueryModifiers::default()))
            .expect("plan");
        let expected = expected_parameters([
            (filter_terms.as_slice(), LabelScheme::Alphabetic),
            (group_terms.as_slice(), LabelScheme::Prefixed("varg".into())),
            (projection_terms.as_slice(), LabelScheme::Prefixed("varp".into())),
        ]);
        let values: Vec<Value> = expected.iter().map(|(_, value)| value.clone()).collect();
        prop_assert_eq!(plan.bound_values(), values.clone());

        let declaration = plan.parameter_declaration().unwrap_or_default();
        let declared: Vec<&str> = declaration
            .split(", ")
            .filter(|entry| !entry.is_empty())
            .collect();
        prop_assert_eq!(declared.len(), expected.len());

        let text = [plan.filter.as_deref(), plan.grouping.as_deref(), plan.result()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let tokens = identifiers(&text);
        for (entry, (label, value)) in declared.iter().zip(&expected) {
            let (type_name, declared_label) = entry.split_once(' ').expect("type and label");
            prop_assert_eq!(type_name, value.type_name());
            prop_assert_eq!(declared_label, label.as_str());
            prop_assert!(tokens.contains(&declared_label));
            prop_assert_eq!(plan.parameters.get(declared_label), Some(value));
        }

        query.list_many(projection).expect("list");
        let recorded = exec.last().expect("prepared");
        prop_assert_eq!(recorded.executions, 1);
        prop_assert_eq!(recorded.bound.unwrap_or_default(), values);
        query.close();
    }

    #[test]
    fn limit_and_offset_produce_half_open_range(
        limit in 0u64..1_000,
        offset in 0u64..1_000,
    ) {
        let p = Source::new("Person", "person");
        let exec = RecordingExecutor::new();
        let mut query = ObjectQuery::new(&exec);
        query.from([p.clone()]).limit(limit).offset(offset);
        query.list(p.expr()).expect("list");

        let recorded = exec.last().expect("prepared");
        prop_assert_eq!(recorded.range, Some((offset, offset + limit)));
        query.close();
    }
}
