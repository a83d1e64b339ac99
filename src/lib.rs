//! # adoptsim
//!
//! Scenario exploration engine for product adoption: simulates how a
//! synthetic population behaves against a product friction scorecard, then
//! searches the space of scorecard modifications for changes worth shipping.
//!
//! ## Architecture
//!
//! - **Scorecard** ([`scorecard`]): four friction dimensions in [0.0, 1.0]
//!   with provenance tags and optional bounds; modified copy-on-write by
//!   actions.
//! - **Behavior model** ([`behavior`]): closed-form per-member probabilities
//!   of trying and succeeding, combining scorecard, member attributes, and
//!   situational [`modifiers`].
//! - **Monte Carlo engine** ([`monte_carlo`]): seeded trial simulation with
//!   attribution, partial dependence, clustering, and outlier detection in
//!   one [`OutcomeBundle`].
//! - **Pareto pruning** ([`pareto`]): total multi-objective dominance over
//!   evaluated scenarios.
//! - **Exploration** ([`explore`]): beam search over an oracle-proposed
//!   action tree, with a bounded oracle gate, a parallel evaluation pool, and
//!   a read-through result cache.
//! - **Summaries** ([`summary`]): best-path extraction over finished runs.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use adoptsim::{
//!     Dimension, ExplorationConfig, Explorer, Goal, InMemoryPopulation, Scorecard,
//!     ScenarioModifiers, ScriptedOracle,
//! };
//!
//! # fn main() -> Result<(), adoptsim::ExploreError> {
//! let baseline = Scorecard::from_scores(
//!     &[
//!         (Dimension::Complexity, 0.8),
//!         (Dimension::InitialEffort, 0.7),
//!         (Dimension::PerceivedRisk, 0.85),
//!         (Dimension::TimeToValue, 0.6),
//!     ],
//!     "current signup flow",
//! )?;
//!
//! let explorer = Explorer::new(
//!     Arc::new(InMemoryPopulation::synthetic(500)),
//!     Arc::new(ScriptedOracle::default()),
//! );
//! let run_id = explorer.start_exploration(
//!     "default",
//!     baseline,
//!     ScenarioModifiers::neutral(),
//!     Goal::MaximizeSuccess,
//!     ExplorationConfig::default(),
//! )?;
//! explorer.wait(run_id, std::time::Duration::from_secs(60))?;
//! let summary = explorer.summarize(run_id)?;
//! println!("best success rate: {:.3}", summary.best_success_rate);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod behavior;
pub mod error;
pub mod explore;
pub mod modifiers;
pub mod monte_carlo;
pub mod outcome;
pub mod pareto;
pub mod population;
pub mod scorecard;
pub mod sink;
pub mod summary;

pub use error::{ConfigurationError, ExploreError, ExploreResult, OracleError, SimError};
pub use explore::{
    ActionOracle, ActionProposal, BeamExplorer, CancelToken, ExplorationConfig, ExplorationRun,
    Explorer, Goal, HistoryEntry, NodeId, ProposalContext, RunId, RunStatus, RunStatusView,
    ScenarioNode, ScriptedOracle,
};
pub use modifiers::{ModifierShift, ScenarioModifiers};
pub use monte_carlo::{MonteCarloConfig, MonteCarloEngine};
pub use outcome::{ClusterSummary, Outcome, OutcomeBundle};
pub use pareto::{dominates, Direction, Objective, ObjectiveField, ObjectiveValues};
pub use population::{
    Attribute, DeviceClass, InMemoryPopulation, PopulationMember, PopulationProvider,
};
pub use scorecard::{Dimension, DimensionDelta, Scorecard, ScorecardDimension};
pub use sink::{InMemorySink, NullSink, PersistenceSink, SinkError};
pub use summary::{select_best, summarize, ExplorationSummary};
