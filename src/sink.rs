//! Persistence sink seam.
//!
//! The engine emits node and run records for storage but owns no schemas,
//! transactions, or queries. Sink failures are logged by the explorer and
//! never fail a run.

use std::sync::Mutex;

use thiserror::Error;

use crate::explore::{ExplorationRun, RunId, ScenarioNode};

/// Error surfaced by a persistence sink.
#[derive(Debug, Error)]
#[error("persistence sink error: {message}")]
pub struct SinkError {
    /// What went wrong, in the sink's own terms.
    pub message: String,
}

impl SinkError {
    /// Creates a sink error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receives node and run records as exploration progresses.
pub trait PersistenceSink: Send + Sync {
    /// Records one evaluated node.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` when the record cannot be stored.
    fn record_node(&self, run_id: RunId, node: &ScenarioNode) -> Result<(), SinkError>;

    /// Records a run snapshot (called per level and at termination).
    ///
    /// # Errors
    ///
    /// Returns `SinkError` when the record cannot be stored.
    fn record_run(&self, run: &ExplorationRun) -> Result<(), SinkError>;
}

/// Discards everything. The default when the caller has no storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl PersistenceSink for NullSink {
    fn record_node(&self, _run_id: RunId, _node: &ScenarioNode) -> Result<(), SinkError> {
        Ok(())
    }

    fn record_run(&self, _run: &ExplorationRun) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Collects records in memory; used by tests and embedded callers.
#[derive(Debug, Default)]
pub struct InMemorySink {
    nodes: Mutex<Vec<(RunId, ScenarioNode)>>,
    runs: Mutex<Vec<ExplorationRun>>,
}

impl InMemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All node records so far.
    #[must_use]
    pub fn nodes(&self) -> Vec<(RunId, ScenarioNode)> {
        self.nodes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// All run snapshots so far.
    #[must_use]
    pub fn runs(&self) -> Vec<ExplorationRun> {
        self.runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl PersistenceSink for InMemorySink {
    fn record_node(&self, run_id: RunId, node: &ScenarioNode) -> Result<(), SinkError> {
        self.nodes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((run_id, node.clone()));
        Ok(())
    }

    fn record_run(&self, run: &ExplorationRun) -> Result<(), SinkError> {
        self.runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(run.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explore::Goal;

    #[test]
    fn null_sink_accepts_everything() {
        let sink = NullSink;
        let run = ExplorationRun::new(Goal::MaximizeSuccess, 3, 2);
        assert!(sink.record_run(&run).is_ok());
    }

    #[test]
    fn in_memory_sink_collects_run_snapshots() {
        let sink = InMemorySink::new();
        let run = ExplorationRun::new(Goal::MaximizeSuccess, 3, 2);
        sink.record_run(&run).unwrap();
        sink.record_run(&run).unwrap();
        assert_eq!(sink.runs().len(), 2);
        assert!(sink.nodes().is_empty());
    }
}
