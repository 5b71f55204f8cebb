#![forbid(unsafe_code)]

//! Object query construction and execution.
//!
//! This module renders typed expression trees into the textual clauses of an
//! object query language, hoists literals into named parameters, and drives an
//! external engine through the [`executor::Executor`] seam.

/// Expression tree: sources, paths, operators and order specifiers.
pub mod ast;

/// Fluent query builder and execution front-end.
///
/// Accumulates clauses, assembles plans and owns every engine handle it
/// prepares until the builder is closed.
pub mod builder;

/// Query construction settings loaded from TOML.
pub mod config;

/// Constant-to-label mapping and parameter declarations.
pub mod constants;

/// Interface of the external execution engine.
pub mod executor;

/// Clause accumulator and pagination modifiers.
pub mod metadata;

/// Operator templates and precedence table.
pub mod patterns;

/// Assembled, inspectable form of a query before execution.
pub mod plan;

/// In-memory executor that records prepared queries.
pub mod recording;

/// Paged result envelope.
pub mod results;

/// Expression-to-text rendering.
///
/// Each clause gets its own pass, which yields the clause text and the
/// constants it hoisted.
pub mod serializer;

/// Values exchanged with the engine.
pub mod value;

pub use ast::{Expr, Operator, Order, OrderSpecifier, Path, Source};
pub use builder::{ObjectQuery, QueryMode};
pub use config::{ConfigError, QueryConfig};
pub use executor::{CompiledQuery, Executor, QueryOutput, Row};
pub use metadata::{QueryMetadata, QueryModifiers};
pub use plan::{PlanShape, QueryPlan};
pub use results::SearchResults;
pub use value::Value;
