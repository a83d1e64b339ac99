//! Worker pool for parallel Monte Carlo evaluations.
//!
//! Sibling candidates at the same depth are mutually independent, so their
//! evaluations run on a bounded, thread-based pool sized to the available
//! cores. Each job receives its own scorecard/modifiers copy; the only shared
//! state is the read-through evaluation cache.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::SimError;
use crate::explore::cache::{EvalCache, EvalKey};
use crate::modifiers::ScenarioModifiers;
use crate::monte_carlo::MonteCarloEngine;
use crate::outcome::OutcomeBundle;
use crate::population::PopulationMember;
use crate::scorecard::Scorecard;

const QUEUE_CAPACITY: usize = 256;

struct Job {
    scorecard: Scorecard,
    modifiers: ScenarioModifiers,
    reply: Sender<Result<Arc<OutcomeBundle>, SimError>>,
}

/// Handle for one submitted evaluation.
pub struct EvalHandle {
    rx: Receiver<Result<Arc<OutcomeBundle>, SimError>>,
}

impl EvalHandle {
    /// Waits for the evaluation to complete.
    ///
    /// # Errors
    ///
    /// Propagates the simulation error, or reports a disconnected pool.
    pub fn join(self) -> Result<Arc<OutcomeBundle>, SimError> {
        self.rx.recv().map_err(|_| SimError::Trial {
            member_id: 0,
            reason: "evaluation pool disconnected".to_string(),
        })?
    }
}

/// Bounded pool of evaluation workers sharing one engine and cache.
pub struct EvalPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl EvalPool {
    /// Starts `workers` threads (defaulting to available parallelism when 0).
    #[must_use]
    pub fn start(
        engine: MonteCarloEngine,
        population: Arc<Vec<PopulationMember>>,
        cache: Arc<EvalCache>,
        workers: usize,
    ) -> Self {
        let workers = if workers == 0 {
            thread::available_parallelism().map_or(2, std::num::NonZeroUsize::get)
        } else {
            workers
        };
        let (tx, rx) = bounded::<Job>(QUEUE_CAPACITY);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let engine = engine.clone();
            let population = Arc::clone(&population);
            let cache = Arc::clone(&cache);
            let handle = thread::Builder::new()
                .name(format!("adoptsim-eval-{idx}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        let key = EvalKey::compute(
                            &job.scorecard,
                            &job.modifiers,
                            engine.config().trial_count,
                        );
                        let result = cache.get_or_compute(key, || {
                            engine.run(&population, &job.scorecard, &job.modifiers)
                        });
                        let _ = job.reply.send(result);
                    }
                })
                .expect("failed to spawn adoptsim evaluation worker");
            handles.push(handle);
        }

        Self {
            tx,
            workers: handles,
        }
    }

    /// Submits one evaluation. Blocks only when the queue is full.
    #[must_use]
    pub fn submit(&self, scorecard: Scorecard, modifiers: ScenarioModifiers) -> EvalHandle {
        let (reply, rx) = bounded(1);
        let job = Job {
            scorecard,
            modifiers,
            reply,
        };
        // A send can only fail after shutdown; the handle then reports the
        // disconnect on join.
        let _ = self.tx.send(job);
        EvalHandle { rx }
    }
}

impl Drop for EvalPool {
    fn drop(&mut self) {
        // Close the channel: workers drain queued jobs then exit.
        let (closed, _) = bounded::<Job>(1);
        drop(std::mem::replace(&mut self.tx, closed));
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
