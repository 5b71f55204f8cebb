//! Assembled query clauses, ready to be applied to an executor handle.
//!
//! Count queries carry no range, projection or ordering: [`PlanShape::Count`]
//! has nowhere to put them.

use serde::Serialize;

use crate::query::constants::ConstantMap;
use crate::query::executor::CompiledQuery;
use crate::query::Value;

/// Result clause of a count query.
pub const COUNT_RESULT: &str = "count(this)";
/// Result clause of a distinct count query.
pub const DISTINCT_COUNT_RESULT: &str = "distinct count(this)";
/// Result clause selecting distinct candidate instances.
pub const DISTINCT_THIS: &str = "distinct this";

/// Clauses that only exist for row-returning queries.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RowClauses {
    /// Row range `[from_incl, to_excl)`.
    pub range: Option<(u64, u64)>,
    /// Result (projection) text; absent means candidate instances.
    pub result: Option<String>,
    /// Ordering text.
    pub ordering: Option<String>,
    /// Whether the executor should return a single row.
    pub unique: bool,
}

/// Query shape.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanShape {
    /// Unique scalar row count.
    Count {
        /// Count distinct candidates.
        distinct: bool,
    },
    /// Row-returning query.
    Rows(RowClauses),
}

impl PlanShape {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            PlanShape::Count { .. } => "count",
            PlanShape::Rows(clauses) if clauses.unique => "unique",
            PlanShape::Rows(_) => "rows",
        }
    }
}

/// Fully assembled query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryPlan {
    /// Type name of the candidate source.
    pub primary_type: String,
    /// Filter text.
    pub filter: Option<String>,
    /// Declared-variables text for auxiliary sources.
    pub variables: Option<String>,
    /// Grouping text, including any having predicate.
    pub grouping: Option<String>,
    /// Shape-dependent clauses.
    pub shape: PlanShape,
    /// Hoisted constants from filter, grouping and projection, in that order.
    pub parameters: ConstantMap,
}

impl QueryPlan {
    /// Result clause text as sent to the executor.
    pub fn result(&self) -> Option<&str> {
        match &self.shape {
            PlanShape::Count { distinct: true } => Some(DISTINCT_COUNT_RESULT),
            PlanShape::Count { distinct: false } => Some(COUNT_RESULT),
            PlanShape::Rows(clauses) => clauses.result.as_deref(),
        }
    }

    /// Ordering clause text.
    pub fn ordering(&self) -> Option<&str> {
        match &self.shape {
            PlanShape::Count { .. } => None,
            PlanShape::Rows(clauses) => clauses.ordering.as_deref(),
        }
    }

    /// Row range.
    pub fn range(&self) -> Option<(u64, u64)> {
        match &self.shape {
            PlanShape::Count { .. } => None,
            PlanShape::Rows(clauses) => clauses.range,
        }
    }

    /// True when the executor is asked for a single row.
    pub fn is_unique(&self) -> bool {
        match &self.shape {
            PlanShape::Count { .. } => true,
            PlanShape::Rows(clauses) => clauses.unique,
        }
    }

    /// Declared-parameters text.
    pub fn parameter_declaration(&self) -> Option<String> {
        self.parameters.declaration()
    }

    /// Values bound positionally at execution time.
    pub fn bound_values(&self) -> Vec<Value> {
        self.parameters.values()
    }

    /// Pushes every present clause into `query`.
    pub fn apply<Q>(&self, query: &mut Q)
    where
        Q: CompiledQuery + ?Sized,
    {
        if let Some(filter) = &self.filter {
            query.set_filter(filter);
        }
        if let Some(variables) = &self.variables {
            query.declare_variables(variables);
        }
        if let Some(grouping) = &self.grouping {
            query.set_grouping(grouping);
        }
        if let Some((from_incl, to_excl)) = self.range() {
            query.set_range(from_incl, to_excl);
        }
        if let Some(result) = self.result() {
            query.set_result(result);
        }
        if let Some(ordering) = self.ordering() {
            query.set_ordering(ordering);
        }
        if let Some(parameters) = self.parameter_declaration() {
            query.declare_parameters(&parameters);
        }
        if self.is_unique() {
            query.set_unique(true);
        }
    }
}
