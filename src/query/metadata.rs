//! Query metadata: the clauses a caller accumulates before executing.

use serde::Serialize;

use crate::query::ast::{Expr, OrderSpecifier};
use crate::types::{QueryError, Result};

/// Pagination modifiers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct QueryModifiers {
    /// Maximum number of rows.
    pub limit: Option<u64>,
    /// Number of rows to skip.
    pub offset: Option<u64>,
}

impl QueryModifiers {
    /// Modifiers restricting to at most `limit` rows.
    pub fn limit(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    /// Modifiers skipping the first `offset` rows.
    pub fn offset(offset: u64) -> Self {
        Self {
            limit: None,
            offset: Some(offset),
        }
    }

    /// Returns these modifiers with `offset` applied.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// True when either bound is set.
    pub fn is_restricting(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }

    /// Row range `[from_incl, to_excl)`, when restricting.
    ///
    /// A missing limit leaves the upper bound at `u64::MAX`.
    pub fn range(&self) -> Option<(u64, u64)> {
        if !self.is_restricting() {
            return None;
        }
        let from_incl = self.offset.unwrap_or(0);
        let to_excl = match self.limit {
            Some(limit) => from_incl.saturating_add(limit),
            None => u64::MAX,
        };
        Some((from_incl, to_excl))
    }
}

/// Clauses of one query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryMetadata {
    filter: Option<Expr>,
    group_by: Vec<Expr>,
    having: Option<Expr>,
    projection: Vec<Expr>,
    order_by: Vec<OrderSpecifier>,
    distinct: bool,
    modifiers: QueryModifiers,
}

impl QueryMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate; successive predicates are conjoined.
    pub fn add_filter(&mut self, expr: Expr) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
    }

    /// Appends grouping expressions.
    pub fn add_group_by(&mut self, exprs: impl IntoIterator<Item = Expr>) {
        self.group_by.extend(exprs);
    }

    /// Adds a having predicate; requires at least one grouping expression.
    pub fn add_having(&mut self, expr: Expr) -> Result<()> {
        if self.group_by.is_empty() {
            return Err(QueryError::InvalidMetadata(
                "having requires at least one group-by expression",
            ));
        }
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        Ok(())
    }

    /// Appends projection columns, flattening constructor calls into their
    /// arguments.
    pub fn add_projection(&mut self, exprs: impl IntoIterator<Item = Expr>) {
        for expr in exprs {
            match expr {
                Expr::Constructor { args, .. } => self.projection.extend(args),
                other => self.projection.push(other),
            }
        }
    }

    /// Appends ordering specifiers.
    pub fn add_order_by(&mut self, specs: impl IntoIterator<Item = OrderSpecifier>) {
        self.order_by.extend(specs);
    }

    /// Sets the distinct flag.
    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    /// Replaces the pagination modifiers.
    pub fn set_modifiers(&mut self, modifiers: QueryModifiers) {
        self.modifiers = modifiers;
    }

    /// Sets the row limit, keeping any offset.
    pub fn set_limit(&mut self, limit: u64) {
        self.modifiers.limit = Some(limit);
    }

    /// Sets the row offset, keeping any limit.
    pub fn set_offset(&mut self, offset: u64) {
        self.modifiers.offset = Some(offset);
    }

    /// Filter predicate.
    pub fn filter(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    /// Grouping expressions.
    pub fn group_by(&self) -> &[Expr] {
        &self.group_by
    }

    /// Having predicate.
    pub fn having(&self) -> Option<&Expr> {
        self.having.as_ref()
    }

    /// Normalized projection columns.
    pub fn projection(&self) -> &[Expr] {
        &self.projection
    }

    /// Ordering specifiers.
    pub fn order_by(&self) -> &[OrderSpecifier] {
        &self.order_by
    }

    /// Distinct flag.
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// Pagination modifiers.
    pub fn modifiers(&self) -> QueryModifiers {
        self.modifiers
    }
}
