//! Query builder and executor front-end.
//!
//! [`ObjectQuery`] accumulates sources and clauses, renders each clause with
//! its own serializer pass, and hands the assembled [`QueryPlan`] to an
//! [`Executor`]. Every handle it prepares stays registered until
//! [`ObjectQuery::close`] (or drop) releases it.

use tracing::{debug, trace, warn};

use crate::query::ast::{Expr, OrderSpecifier, Source};
use crate::query::config::QueryConfig;
use crate::query::constants::ConstantMap;
use crate::query::executor::{CompiledQuery, Executor, HandleRegistry, QueryOutput, Row};
use crate::query::metadata::{QueryMetadata, QueryModifiers};
use crate::query::plan::{PlanShape, QueryPlan, RowClauses, DISTINCT_THIS};
use crate::query::results::SearchResults;
use crate::query::serializer::{Rendered, Serializer};
use crate::query::Value;
use crate::types::{QueryError, Result};

/// Execution mode a plan is assembled for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum QueryMode {
    /// Scalar count of matching candidates.
    Count,
    /// Row sequence restricted by the modifiers.
    List(QueryModifiers),
    /// At most one row.
    Unique,
}

/// Filter text and its constants, cached until the clauses change.
#[derive(Clone, Debug, Default)]
struct FilterClause {
    text: Option<String>,
    constants: ConstantMap,
}

/// Builder over a single executor.
///
/// Not safe for concurrent use; give each thread its own builder.
pub struct ObjectQuery<E: Executor> {
    executor: E,
    config: QueryConfig,
    sources: Vec<Source>,
    metadata: QueryMetadata,
    filter: Option<FilterClause>,
    handles: HandleRegistry<E::Query>,
}

impl<E: Executor> ObjectQuery<E> {
    /// Creates a builder with the default configuration.
    pub fn new(executor: E) -> Self {
        Self::with_config(executor, QueryConfig::default())
    }

    /// Creates a builder with custom templates or label prefixes.
    pub fn with_config(executor: E, config: QueryConfig) -> Self {
        Self {
            executor,
            config,
            sources: Vec::new(),
            metadata: QueryMetadata::new(),
            filter: None,
            handles: HandleRegistry::default(),
        }
    }

    /// Registers sources; the first one registered is the candidate class.
    pub fn from<I>(&mut self, sources: I) -> &mut Self
    where
        I: IntoIterator<Item = Source>,
    {
        self.sources.extend(sources);
        self.filter = None;
        self
    }

    /// Adds a filter predicate, conjoined with any existing one.
    pub fn filter(&mut self, predicate: Expr) -> &mut Self {
        self.metadata.add_filter(predicate);
        self.filter = None;
        self
    }

    /// Appends grouping expressions.
    pub fn group_by<I>(&mut self, exprs: I) -> &mut Self
    where
        I: IntoIterator<Item = Expr>,
    {
        self.metadata.add_group_by(exprs);
        self.filter = None;
        self
    }

    /// Adds a having predicate; fails unless grouping is set.
    pub fn having(&mut self, predicate: Expr) -> Result<&mut Self> {
        self.metadata.add_having(predicate)?;
        self.filter = None;
        Ok(self)
    }

    /// Appends ordering specifiers.
    pub fn order_by<I>(&mut self, specs: I) -> &mut Self
    where
        I: IntoIterator<Item = OrderSpecifier>,
    {
        self.metadata.add_order_by(specs);
        self.filter = None;
        self
    }

    /// Appends projection columns kept across executions.
    pub fn project<I>(&mut self, exprs: I) -> &mut Self
    where
        I: IntoIterator<Item = Expr>,
    {
        self.metadata.add_projection(exprs);
        self.filter = None;
        self
    }

    /// Marks the query distinct.
    pub fn distinct(&mut self) -> &mut Self {
        self.metadata.set_distinct(true);
        self.filter = None;
        self
    }

    /// Limits the number of rows.
    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.metadata.set_limit(limit);
        self.filter = None;
        self
    }

    /// Skips the first `offset` rows.
    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.metadata.set_offset(offset);
        self.filter = None;
        self
    }

    /// Replaces the pagination modifiers.
    pub fn restrict(&mut self, modifiers: QueryModifiers) -> &mut Self {
        self.metadata.set_modifiers(modifiers);
        self.filter = None;
        self
    }

    /// Resets every clause and the cached filter. Sources are kept.
    pub fn clear(&mut self) -> &mut Self {
        self.metadata = QueryMetadata::new();
        self.filter = None;
        self
    }

    /// Current clauses.
    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    /// Registered sources.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Number of handles awaiting release.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Counts matching candidates.
    pub fn count(&mut self) -> Result<u64> {
        let plan = self.plan(&[], QueryMode::Count)?;
        self.run_count(&plan)
    }

    /// Lists a single projected column.
    pub fn list(&mut self, expr: Expr) -> Result<Vec<Value>> {
        let plan = self.plan(&[expr], QueryMode::List(self.metadata.modifiers()))?;
        let rows = self.run_rows(&plan)?;
        rows.into_iter().map(single_column).collect()
    }

    /// Lists several projected columns; each row holds one value per column.
    pub fn list_many<I>(&mut self, exprs: I) -> Result<Vec<Row>>
    where
        I: IntoIterator<Item = Expr>,
    {
        let exprs: Vec<Expr> = exprs.into_iter().collect();
        let plan = self.plan(&exprs, QueryMode::List(self.metadata.modifiers()))?;
        self.run_rows(&plan)
    }

    /// Same rows as [`ObjectQuery::list`], as a single-pass iterator.
    ///
    /// Rows are fetched eagerly; this is not a streaming cursor.
    pub fn iterate(&mut self, expr: Expr) -> Result<std::vec::IntoIter<Value>> {
        Ok(self.list(expr)?.into_iter())
    }

    /// Same rows as [`ObjectQuery::list_many`], as a single-pass iterator.
    ///
    /// Rows are fetched eagerly; this is not a streaming cursor.
    pub fn iterate_many<I>(&mut self, exprs: I) -> Result<std::vec::IntoIter<Row>>
    where
        I: IntoIterator<Item = Expr>,
    {
        Ok(self.list_many(exprs)?.into_iter())
    }

    /// Returns the only matching value, `None` when nothing matches.
    ///
    /// More than one row is a [`QueryError::CardinalityViolation`].
    pub fn unique_result(&mut self, expr: Expr) -> Result<Option<Value>> {
        let plan = self.plan(&[expr], QueryMode::Unique)?;
        match self.execute(&plan)? {
            QueryOutput::Unique(row) => row.map(single_column).transpose(),
            QueryOutput::Rows(rows) => match rows.len() {
                0 => Ok(None),
                1 => rows.into_iter().next().map(single_column).transpose(),
                n => Err(QueryError::CardinalityViolation { rows: n }),
            },
        }
    }

    /// Counts first and only fetches the page when something matches.
    pub fn list_results(&mut self, expr: Expr) -> Result<SearchResults<Value>> {
        let projection = [expr];
        let count_plan = self.plan(&projection, QueryMode::Count)?;
        let total = self.run_count(&count_plan)?;
        if total == 0 {
            debug!("count returned zero; skipping page query");
            return Ok(SearchResults::empty());
        }
        let modifiers = self.metadata.modifiers();
        let plan = self.plan(&projection, QueryMode::List(modifiers))?;
        let rows = self
            .run_rows(&plan)?
            .into_iter()
            .map(single_column)
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchResults::new(rows, modifiers, total))
    }

    /// Assembles the plan `mode` would execute, projecting `extra` after any
    /// columns added with [`ObjectQuery::project`]. No handle is prepared.
    pub fn plan(&mut self, extra: &[Expr], mode: QueryMode) -> Result<QueryPlan> {
        if self.sources.is_empty() {
            return Err(QueryError::NoSourceRegistered);
        }
        let filter = self.filter_clause()?;
        let mut effective = self.metadata.clone();
        effective.add_projection(extra.iter().cloned());
        let plan = assemble(
            &self.config,
            &self.sources,
            &self.metadata,
            effective.projection(),
            filter,
            mode,
        )?;
        debug!(
            primary = %plan.primary_type,
            shape = plan.shape.name(),
            parameters = plan.parameters.len(),
            "assembled query plan"
        );
        trace!(
            filter = ?plan.filter,
            variables = ?plan.variables,
            grouping = ?plan.grouping,
            result = ?plan.result(),
            ordering = ?plan.ordering(),
            range = ?plan.range(),
            "query clauses"
        );
        Ok(plan)
    }

    /// JSON form of [`ObjectQuery::plan`], for diagnostics.
    pub fn explain(&mut self, extra: &[Expr], mode: QueryMode) -> Result<serde_json::Value> {
        let plan = self.plan(extra, mode)?;
        serde_json::to_value(&plan).map_err(|err| QueryError::Serialization(err.to_string()))
    }

    /// Releases every handle prepared so far.
    pub fn close(&mut self) {
        let released = self.handles.release_all();
        debug!(released, "released query handles");
    }

    fn filter_clause(&mut self) -> Result<FilterClause> {
        if let Some(cached) = &self.filter {
            return Ok(cached.clone());
        }
        let clause = match (self.metadata.filter(), self.sources.first()) {
            (Some(predicate), Some(candidate)) => {
                let reserved = source_vars(&self.sources);
                let mut serializer =
                    Serializer::new(self.config.patterns(), candidate, self.config.filter_labels())
                        .reserving(&reserved);
                serializer.handle(predicate)?;
                let rendered = serializer.finish();
                FilterClause {
                    text: Some(rendered.text),
                    constants: rendered.constants,
                }
            }
            _ => FilterClause::default(),
        };
        self.filter = Some(clause.clone());
        Ok(clause)
    }

    fn execute(&mut self, plan: &QueryPlan) -> Result<QueryOutput> {
        let query = self.executor.prepare(&plan.primary_type)?;
        let query = self.handles.register(query);
        plan.apply(query);
        let values = plan.bound_values();
        if values.is_empty() {
            query.execute()
        } else {
            query.execute_with_array(&values)
        }
    }

    fn run_rows(&mut self, plan: &QueryPlan) -> Result<Vec<Row>> {
        match self.execute(plan)? {
            QueryOutput::Rows(rows) => Ok(rows),
            QueryOutput::Unique(_) => Err(QueryError::UnexpectedOutput(
                "list query returned a unique result",
            )),
        }
    }

    fn run_count(&mut self, plan: &QueryPlan) -> Result<u64> {
        let row = match self.execute(plan)? {
            QueryOutput::Unique(row) => row,
            QueryOutput::Rows(rows) if rows.len() <= 1 => rows.into_iter().next(),
            QueryOutput::Rows(rows) => {
                return Err(QueryError::CardinalityViolation { rows: rows.len() })
            }
        };
        let value = match row {
            Some(row) => single_column(row)?,
            None => return Err(QueryError::UnexpectedOutput("count returned no row")),
        };
        value
            .as_long()
            .and_then(|count| u64::try_from(count).ok())
            .ok_or(QueryError::UnexpectedOutput(
                "count returned a non-integral value",
            ))
    }
}

impl<E: Executor> Drop for ObjectQuery<E> {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            warn!(
                open = self.handles.len(),
                "query dropped without close; releasing handles"
            );
            self.handles.release_all();
        }
    }
}

fn single_column(row: Row) -> Result<Value> {
    let mut columns = row.into_iter();
    match (columns.next(), columns.next()) {
        (Some(value), None) => Ok(value),
        (None, _) => Err(QueryError::UnexpectedOutput("row has no columns")),
        (Some(_), Some(_)) => Err(QueryError::UnexpectedOutput(
            "single-column query returned several columns; use list_many",
        )),
    }
}

/// Identifiers a hoisted label must not shadow.
fn source_vars(sources: &[Source]) -> Vec<String> {
    sources.iter().map(|source| source.var.clone()).collect()
}

/// Runs the clause passes in order: filter (already rendered), variables,
/// grouping, then range, projection and ordering for row queries.
fn assemble(
    config: &QueryConfig,
    sources: &[Source],
    metadata: &QueryMetadata,
    projection: &[Expr],
    filter: FilterClause,
    mode: QueryMode,
) -> Result<QueryPlan> {
    let (candidate, auxiliary) = sources
        .split_first()
        .ok_or(QueryError::NoSourceRegistered)?;
    let mut parameters = filter.constants;
    let reserved = source_vars(sources);

    let variables = if auxiliary.is_empty() {
        None
    } else {
        let declared: Vec<String> = auxiliary
            .iter()
            .map(|source| format!("{} {}", source.type_name, source.var))
            .collect();
        Some(declared.join(", "))
    };

    let grouping = if metadata.group_by().is_empty() {
        None
    } else {
        let mut serializer = Serializer::new(config.patterns(), candidate, config.group_labels())
            .reserving(&reserved);
        serializer.handle_list(", ", metadata.group_by())?;
        if let Some(having) = metadata.having() {
            serializer.append(" having ").handle(having)?;
        }
        let Rendered { text, constants } = serializer.finish();
        parameters.merge(constants)?;
        Some(text)
    };

    let shape = match mode {
        QueryMode::Count => PlanShape::Count {
            distinct: metadata.is_distinct(),
        },
        QueryMode::List(modifiers) => PlanShape::Rows(row_clauses(
            config,
            candidate,
            metadata,
            projection,
            modifiers,
            &reserved,
            &mut parameters,
        )?),
        QueryMode::Unique => PlanShape::Rows(RowClauses {
            unique: true,
            ..row_clauses(
                config,
                candidate,
                metadata,
                projection,
                QueryModifiers::limit(1),
                &reserved,
                &mut parameters,
            )?
        }),
    };

    Ok(QueryPlan {
        primary_type: candidate.type_name.clone(),
        filter: filter.text,
        variables,
        grouping,
        shape,
        parameters,
    })
}

fn row_clauses(
    config: &QueryConfig,
    candidate: &Source,
    metadata: &QueryMetadata,
    projection: &[Expr],
    modifiers: QueryModifiers,
    reserved: &[String],
    parameters: &mut ConstantMap,
) -> Result<RowClauses> {
    let projects_candidate = matches!(projection, [only] if only.is_source(candidate));
    let result = if !projection.is_empty() && !projects_candidate {
        let mut serializer =
            Serializer::new(config.patterns(), candidate, config.projection_labels())
                .reserving(reserved);
        if metadata.is_distinct() {
            serializer.append("distinct ");
        }
        serializer.handle_list(", ", projection)?;
        let Rendered { text, constants } = serializer.finish();
        parameters.merge(constants)?;
        Some(text)
    } else if metadata.is_distinct() {
        Some(DISTINCT_THIS.to_owned())
    } else {
        None
    };

    let ordering = if metadata.order_by().is_empty() {
        None
    } else {
        let mut serializer = Serializer::without_constants(config.patterns(), candidate);
        serializer.handle_order(metadata.order_by())?;
        Some(serializer.finish().text)
    };

    Ok(RowClauses {
        range: modifiers.range(),
        result,
        ordering,
        unique: false,
    })
}
