//! In-memory executor that records every prepared query and replays
//! scripted outputs. Used by tests and for prototyping without an engine.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::query::executor::{CompiledQuery, Executor, QueryOutput, Row};
use crate::query::Value;
use crate::types::{QueryError, Result};

/// Snapshot of everything set on one handle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PreparedQuery {
    /// Candidate type passed to `prepare`.
    pub primary_type: String,
    /// Filter text.
    pub filter: Option<String>,
    /// Declared variables text.
    pub variables: Option<String>,
    /// Declared parameters text.
    pub parameters: Option<String>,
    /// Grouping text.
    pub grouping: Option<String>,
    /// Row range.
    pub range: Option<(u64, u64)>,
    /// Result text.
    pub result: Option<String>,
    /// Ordering text.
    pub ordering: Option<String>,
    /// Unique flag.
    pub unique: bool,
    /// Values of the last `execute_with_array` call.
    pub bound: Option<Vec<Value>>,
    /// Number of executions.
    pub executions: usize,
    /// Number of `close_all` calls.
    pub closes: usize,
}

enum Scripted {
    Output(QueryOutput),
    Failure(String),
}

#[derive(Default)]
struct Recorder {
    prepared: Vec<PreparedQuery>,
    outputs: VecDeque<Scripted>,
}

/// Executor recording prepared queries.
///
/// Outputs pushed with the `push_*` methods are returned by executions in
/// order; an unscripted execution returns no rows.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    recorder: Arc<Mutex<Recorder>>,
}

impl RecordingExecutor {
    /// Creates an executor with no scripted outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a row sequence.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.push(Scripted::Output(QueryOutput::Rows(rows)));
    }

    /// Scripts single-column rows.
    pub fn push_values<I, V>(&self, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let rows = values.into_iter().map(|v| vec![v.into()]).collect();
        self.push_rows(rows);
    }

    /// Scripts a unique result.
    pub fn push_unique(&self, row: Option<Row>) {
        self.push(Scripted::Output(QueryOutput::Unique(row)));
    }

    /// Scripts a count result.
    pub fn push_count(&self, count: i64) {
        self.push_unique(Some(vec![Value::Long(count)]));
    }

    /// Scripts an engine failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(Scripted::Failure(message.into()));
    }

    /// Every query prepared so far, in preparation order.
    pub fn prepared(&self) -> Vec<PreparedQuery> {
        self.recorder.lock().prepared.clone()
    }

    /// Most recently prepared query.
    pub fn last(&self) -> Option<PreparedQuery> {
        self.recorder.lock().prepared.last().cloned()
    }

    fn push(&self, scripted: Scripted) {
        self.recorder.lock().outputs.push_back(scripted);
    }
}

impl Executor for RecordingExecutor {
    type Query = RecordedQuery;

    fn prepare(&self, primary_type: &str) -> Result<RecordedQuery> {
        let mut recorder = self.recorder.lock();
        recorder.prepared.push(PreparedQuery {
            primary_type: primary_type.to_owned(),
            ..PreparedQuery::default()
        });
        Ok(RecordedQuery {
            id: recorder.prepared.len() - 1,
            recorder: Arc::clone(&self.recorder),
        })
    }
}

/// Handle produced by [`RecordingExecutor`].
pub struct RecordedQuery {
    id: usize,
    recorder: Arc<Mutex<Recorder>>,
}

impl RecordedQuery {
    fn update(&self, f: impl FnOnce(&mut PreparedQuery)) {
        let mut recorder = self.recorder.lock();
        if let Some(prepared) = recorder.prepared.get_mut(self.id) {
            f(prepared);
        }
    }

    fn run(&self, values: Option<&[Value]>) -> Result<QueryOutput> {
        let mut recorder = self.recorder.lock();
        let unique = {
            let Some(prepared) = recorder.prepared.get_mut(self.id) else {
                return Err(QueryError::execution(format!(
                    "query handle {} was never prepared",
                    self.id
                )));
            };
            let declared = prepared
                .parameters
                .as_deref()
                .map_or(0, |text| text.split(", ").count());
            let supplied = values.map_or(0, <[Value]>::len);
            if declared != supplied {
                return Err(QueryError::execution(format!(
                    "query declares {declared} parameter(s) but {supplied} were bound"
                )));
            }
            prepared.executions += 1;
            prepared.bound = values.map(<[Value]>::to_vec);
            prepared.unique
        };
        match recorder.outputs.pop_front() {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Failure(message)) => Err(QueryError::execution(message)),
            None if unique => Ok(QueryOutput::Unique(None)),
            None => Ok(QueryOutput::Rows(Vec::new())),
        }
    }
}

impl CompiledQuery for RecordedQuery {
    fn set_filter(&mut self, filter: &str) {
        self.update(|q| q.filter = Some(filter.to_owned()));
    }

    fn declare_variables(&mut self, variables: &str) {
        self.update(|q| q.variables = Some(variables.to_owned()));
    }

    fn declare_parameters(&mut self, parameters: &str) {
        self.update(|q| q.parameters = Some(parameters.to_owned()));
    }

    fn set_grouping(&mut self, grouping: &str) {
        self.update(|q| q.grouping = Some(grouping.to_owned()));
    }

    fn set_range(&mut self, from_incl: u64, to_excl: u64) {
        self.update(|q| q.range = Some((from_incl, to_excl)));
    }

    fn set_result(&mut self, result: &str) {
        self.update(|q| q.result = Some(result.to_owned()));
    }

    fn set_ordering(&mut self, ordering: &str) {
        self.update(|q| q.ordering = Some(ordering.to_owned()));
    }

    fn set_unique(&mut self, unique: bool) {
        self.update(|q| q.unique = unique);
    }

    fn execute_with_array(&mut self, values: &[Value]) -> Result<QueryOutput> {
        self.run(Some(values))
    }

    fn execute(&mut self) -> Result<QueryOutput> {
        self.run(None)
    }

    fn close_all(&mut self) {
        self.update(|q| q.closes += 1);
    }
}
