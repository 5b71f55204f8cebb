//! Interface of the external execution engine.
//!
//! The engine prepares one handle per query, receives clause texts through
//! setters, and executes with positionally bound parameter values. Handles
//! hold engine-side resources until [`CompiledQuery::close_all`] is called.

use crate::query::Value;
use crate::types::Result;

/// One result row; a single element unless several columns are projected.
pub type Row = Vec<Value>;

/// Raw output of an execution.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutput {
    /// Row sequence of a non-unique query.
    Rows(Vec<Row>),
    /// Single row (or nothing) of a unique query.
    Unique(Option<Row>),
}

/// Prepared query handle owned by the engine.
pub trait CompiledQuery {
    /// Sets the filter predicate text.
    fn set_filter(&mut self, filter: &str);
    /// Declares auxiliary variables, `"<Type> <name>[, ...]"`.
    fn declare_variables(&mut self, variables: &str);
    /// Declares parameters, `"<Type> <label>[, ...]"`.
    fn declare_parameters(&mut self, parameters: &str);
    /// Sets the grouping text.
    fn set_grouping(&mut self, grouping: &str);
    /// Restricts rows to `[from_incl, to_excl)`.
    fn set_range(&mut self, from_incl: u64, to_excl: u64);
    /// Sets the result (projection) text.
    fn set_result(&mut self, result: &str);
    /// Sets the ordering text.
    fn set_ordering(&mut self, ordering: &str);
    /// Requests a single row instead of a sequence.
    fn set_unique(&mut self, unique: bool);
    /// Executes with parameter values bound in declaration order.
    fn execute_with_array(&mut self, values: &[Value]) -> Result<QueryOutput>;
    /// Executes a query that declares no parameters.
    fn execute(&mut self) -> Result<QueryOutput>;
    /// Releases every result and resource held by the handle.
    fn close_all(&mut self);
}

/// Factory for prepared query handles.
pub trait Executor {
    /// Handle type produced by [`Executor::prepare`].
    type Query: CompiledQuery;

    /// Prepares a query whose candidate class is `primary_type`.
    fn prepare(&self, primary_type: &str) -> Result<Self::Query>;
}

impl<E> Executor for &E
where
    E: Executor + ?Sized,
{
    type Query = E::Query;

    fn prepare(&self, primary_type: &str) -> Result<Self::Query> {
        (**self).prepare(primary_type)
    }
}

/// Owner of every handle a query builder acquired.
///
/// Handles are registered as soon as they are prepared, so a failed
/// execution still leaves its handle here for release.
pub struct HandleRegistry<Q: CompiledQuery> {
    handles: Vec<Q>,
}

impl<Q: CompiledQuery> Default for HandleRegistry<Q> {
    fn default() -> Self {
        Self {
            handles: Vec::new(),
        }
    }
}

impl<Q: CompiledQuery> HandleRegistry<Q> {
    /// Takes ownership of `handle`, returning it for configuration.
    pub fn register(&mut self, handle: Q) -> &mut Q {
        self.handles.push(handle);
        let last = self.handles.len() - 1;
        &mut self.handles[last]
    }

    /// Number of handles currently held.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when no handles are held.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Closes and forgets every held handle, returning how many were closed.
    pub fn release_all(&mut self) -> usize {
        let released = self.handles.len();
        for mut handle in self.handles.drain(..) {
            handle.close_all();
        }
        released
    }
}
