#![forbid(unsafe_code)]

//! Crate-wide error type and result alias.

use std::error::Error as StdError;

use thiserror::Error;

use crate::query::config::ConfigError;

/// Boxed executor failure surfaced verbatim to the caller.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced while assembling or executing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Query metadata was mutated into an inconsistent state.
    #[error("invalid query metadata: {0}")]
    InvalidMetadata(&'static str),
    /// A build was attempted before any source was registered.
    #[error("query has no source; call from() first")]
    NoSourceRegistered,
    /// The external executor rejected or failed the query.
    #[error("execution failed: {0}")]
    Execution(#[source] BoxError),
    /// A unique query produced more than one row.
    #[error("unique result expected but query returned {rows} rows")]
    CardinalityViolation {
        /// Number of rows the executor returned.
        rows: usize,
    },
    /// Expression shape the target grammar cannot express.
    #[error("unsupported expression: {0}")]
    Unsupported(&'static str),
    /// Expression tree was malformed for its operator.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Two clause passes produced the same constant label.
    #[error("constant label '{0}' declared twice")]
    DuplicateLabel(String),
    /// Executor output did not have the shape the query mode requires.
    #[error("unexpected executor output: {0}")]
    UnexpectedOutput(&'static str),
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl QueryError {
    /// Wraps an executor-side error without interpreting it.
    pub fn execution<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        QueryError::Execution(err.into())
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidMetadata(_) => "InvalidMetadata",
            QueryError::NoSourceRegistered => "NoSourceRegistered",
            QueryError::Execution(_) => "ExecutionFailure",
            QueryError::CardinalityViolation { .. } => "CardinalityViolation",
            QueryError::Unsupported(_) => "Unsupported",
            QueryError::Serialization(_) => "Serialization",
            QueryError::DuplicateLabel(_) => "DuplicateLabel",
            QueryError::UnexpectedOutput(_) => "UnexpectedOutput",
            QueryError::Config(_) => "Config",
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, QueryError>;
