//! Run lifecycle facade: start, watch, summarize, cancel.
//!
//! Each run executes on its own named background thread; callers observe it
//! through cheap snapshots of the shared run state. The registry keeps every
//! run (terminal ones included) so status and summaries stay queryable after
//! the worker exits.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ExploreError, ExploreResult};
use crate::explore::beam::{BeamExplorer, CancelToken};
use crate::explore::oracle::ActionOracle;
use crate::explore::{ExplorationConfig, ExplorationRun, Goal, NodeId, RunId, RunStatus};
use crate::modifiers::ScenarioModifiers;
use crate::population::PopulationProvider;
use crate::scorecard::Scorecard;
use crate::sink::{NullSink, PersistenceSink};
use crate::summary::{summarize, ExplorationSummary};

/// Point-in-time view of a run, safe to serialize for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatusView {
    /// The run.
    pub run_id: RunId,
    /// Lifecycle state at snapshot time.
    pub status: RunStatus,
    /// The run's goal.
    pub goal: Goal,
    /// Nodes evaluated so far.
    pub node_count: usize,
    /// Best node, once the run has terminated with one.
    pub best_node_id: Option<NodeId>,
    /// Deepest level evaluated so far.
    pub depth_reached: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run terminated, if it has.
    pub finished_at: Option<DateTime<Utc>>,
}

struct RunHandle {
    run: Arc<RwLock<ExplorationRun>>,
    cancel: CancelToken,
}

/// Entry point owning the injected seams and the run registry.
pub struct Explorer {
    population: Arc<dyn PopulationProvider>,
    oracle: Arc<dyn ActionOracle>,
    sink: Arc<dyn PersistenceSink>,
    runs: RwLock<HashMap<RunId, RunHandle>>,
}

impl Explorer {
    /// Creates an explorer with no persistence.
    #[must_use]
    pub fn new(
        population: Arc<dyn PopulationProvider>,
        oracle: Arc<dyn ActionOracle>,
    ) -> Self {
        Self::with_sink(population, oracle, Arc::new(NullSink))
    }

    /// Creates an explorer that emits node and run records to `sink`.
    #[must_use]
    pub fn with_sink(
        population: Arc<dyn PopulationProvider>,
        oracle: Arc<dyn ActionOracle>,
        sink: Arc<dyn PersistenceSink>,
    ) -> Self {
        Self {
            population,
            oracle,
            sink,
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Starts an exploration run in the background.
    ///
    /// Configuration and modifier validation happens synchronously, so a bad
    /// request never reaches a worker thread. Everything after (population
    /// fetch, simulation, oracle calls) reports through the run's status.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for invalid settings and an internal
    /// error when the worker thread cannot be spawned.
    pub fn start_exploration(
        &self,
        population_id: &str,
        baseline: Scorecard,
        modifiers: ScenarioModifiers,
        goal: Goal,
        config: ExplorationConfig,
    ) -> ExploreResult<RunId> {
        modifiers.validate()?;
        let explorer = BeamExplorer::new(config.clone(), Arc::clone(&self.oracle), Arc::clone(&self.sink))?;

        let run = Arc::new(RwLock::new(ExplorationRun::new(
            goal,
            config.beam_width,
            config.max_depth,
        )));
        let run_id = read(&run).id;
        let cancel = CancelToken::new();

        {
            let mut registry = self
                .runs
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            registry.insert(
                run_id,
                RunHandle {
                    run: Arc::clone(&run),
                    cancel: cancel.clone(),
                },
            );
        }

        info!(run = %run_id, population = %population_id, %goal, "exploration run started");

        let provider = Arc::clone(&self.population);
        let population_id = population_id.to_string();
        let worker_run = Arc::clone(&run);
        let worker_cancel = cancel;
        thread::Builder::new()
            .name(format!("adoptsim-run-{run_id}"))
            .spawn(move || {
                let population = match provider.fetch(&population_id) {
                    Ok(members) => members,
                    Err(err) => {
                        warn!(run = %run_id, population = %population_id, error = %err, "population fetch failed");
                        write(&worker_run).fail(None);
                        return;
                    }
                };
                if let Err(err) =
                    explorer.explore(&worker_run, population, baseline, modifiers, &worker_cancel)
                {
                    warn!(run = %run_id, error = %err, "exploration run failed");
                }
            })
            .map_err(|err| ExploreError::internal(format!("failed to spawn run worker: {err}")))?;

        Ok(run_id)
    }

    /// Snapshot of a run's current state.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for unknown ids.
    pub fn get_run_status(&self, run_id: RunId) -> ExploreResult<RunStatusView> {
        let run = self.run(run_id)?;
        let guard = read(&run);
        Ok(RunStatusView {
            run_id: guard.id,
            status: guard.status(),
            goal: guard.goal,
            node_count: guard.nodes().len(),
            best_node_id: guard.best_node_id(),
            depth_reached: guard.nodes().iter().map(|n| n.depth).max().unwrap_or(0),
            started_at: guard.started_at,
            finished_at: guard.finished_at,
        })
    }

    /// Summarizes a run's best path. Valid on running and terminal runs; a
    /// running run is summarized over its tree so far.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for unknown ids.
    pub fn summarize(&self, run_id: RunId) -> ExploreResult<ExplorationSummary> {
        let run = self.run(run_id)?;
        let guard = read(&run);
        Ok(summarize(&guard))
    }

    /// Requests cancellation. The run completes at the next level boundary
    /// with the nodes evaluated so far; cancelling a terminal run is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for unknown ids.
    pub fn cancel(&self, run_id: RunId) -> ExploreResult<()> {
        let registry = self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let handle = registry.get(&run_id).ok_or(ExploreError::RunNotFound {
            run_id: run_id.to_string(),
        })?;
        handle.cancel.cancel();
        Ok(())
    }

    /// Blocks until the run reaches a terminal status or `timeout` elapses,
    /// returning the status observed last.
    ///
    /// # Errors
    ///
    /// Returns `RunNotFound` for unknown ids.
    pub fn wait(&self, run_id: RunId, timeout: Duration) -> ExploreResult<RunStatus> {
        const POLL: Duration = Duration::from_millis(10);
        let run = self.run(run_id)?;
        let deadline = Instant::now() + timeout;
        loop {
            let status = read(&run).status();
            if status.is_terminal() || Instant::now() >= deadline {
                return Ok(status);
            }
            thread::sleep(POLL);
        }
    }

    fn run(&self, run_id: RunId) -> ExploreResult<Arc<RwLock<ExplorationRun>>> {
        let registry = self
            .runs
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        registry
            .get(&run_id)
            .map(|h| Arc::clone(&h.run))
            .ok_or(ExploreError::RunNotFound {
                run_id: run_id.to_string(),
            })
    }
}

fn read(run: &Arc<RwLock<ExplorationRun>>) -> std::sync::RwLockReadGuard<'_, ExplorationRun> {
    run.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(run: &Arc<RwLock<ExplorationRun>>) -> std::sync::RwLockWriteGuard<'_, ExplorationRun> {
    run.write().unwrap_or_else(PoisonError::into_inner)
}
