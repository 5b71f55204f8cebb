//! Paged result envelope.

use serde::Serialize;

use crate::query::metadata::QueryModifiers;

/// One page of rows together with the modifiers that produced it and the
/// total number of matching rows.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResults<T> {
    results: Vec<T>,
    modifiers: QueryModifiers,
    total: u64,
}

impl<T> SearchResults<T> {
    /// Wraps a page of rows.
    pub fn new(results: Vec<T>, modifiers: QueryModifiers, total: u64) -> Self {
        Self {
            results,
            modifiers,
            total,
        }
    }

    /// Envelope returned when nothing matches.
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            modifiers: QueryModifiers::default(),
            total: 0,
        }
    }

    /// Rows of this page.
    pub fn results(&self) -> &[T] {
        &self.results
    }

    /// Consumes the envelope, yielding its rows.
    pub fn into_results(self) -> Vec<T> {
        self.results
    }

    /// Modifiers used for the page query.
    pub fn modifiers(&self) -> QueryModifiers {
        self.modifiers
    }

    /// Total number of matching rows across all pages.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// True when no row matched.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
