//! Typed object-query builder.
//!
//! Builds queries over an object store from expression trees, renders them to
//! query-language text with positional parameters, and executes them through a
//! pluggable engine. See [`query::ObjectQuery`] for the entry point.

#![warn(missing_docs)]

pub mod query;
pub mod types;

pub use query::{Expr, ObjectQuery, QueryConfig, Source, Value};
pub use types::{QueryError, Result};
