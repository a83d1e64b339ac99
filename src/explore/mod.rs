//! Exploration tree types and run lifecycle.
//!
//! Scenario nodes live in a flat arena keyed by [`NodeId`], with `parent_id`
//! back-references instead of child-pointer graphs. Nodes are immutable once
//! evaluated; an [`ExplorationRun`] only ever appends nodes and updates its
//! status, and freezes entirely once the status leaves `Running`.

mod beam;
mod cache;
mod oracle;
mod pool;
mod runtime;

pub use beam::{BeamExplorer, CancelToken};
pub use cache::{EvalCache, EvalKey};
pub use oracle::{ActionOracle, ActionProposal, HistoryEntry, ProposalContext, ScriptedOracle};
pub use pool::EvalPool;
pub use runtime::{Explorer, RunStatusView};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, ExploreError, ExploreResult};
use crate::modifiers::ScenarioModifiers;
use crate::monte_carlo::MonteCarloConfig;
use crate::outcome::OutcomeBundle;
use crate::pareto::{Direction, Objective, ObjectiveField, ObjectiveValues};
use crate::scorecard::{Dimension, Scorecard};

/// Identifier of a scenario node within one run. Allocated sequentially, so
/// lower ids are older; ranking ties break toward the lower id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an exploration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(uuid::Uuid);

impl RunId {
    /// Creates a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optimization goal of a run. Used to rank non-dominated survivors; never
/// used as a dominance criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Maximize the simulated success rate.
    MaximizeSuccess,
    /// Minimize the scorecard's perceived risk.
    MinimizeRisk,
    /// Minimize the did-not-try rate.
    MinimizeAbandonment,
}

impl Goal {
    /// The objective this goal ranks by.
    #[must_use]
    pub const fn objective(self) -> Objective {
        match self {
            Self::MaximizeSuccess => {
                Objective::new(ObjectiveField::SuccessRate, Direction::Maximize)
            }
            Self::MinimizeRisk => {
                Objective::new(ObjectiveField::PerceivedRiskScore, Direction::Minimize)
            }
            Self::MinimizeAbandonment => {
                Objective::new(ObjectiveField::DidNotTryRate, Direction::Minimize)
            }
        }
    }

    /// Goal-ranking key for a node: higher is better regardless of the
    /// objective's direction. `None` when the value is unavailable.
    #[must_use]
    pub fn ranking_key(self, node: &ScenarioNode) -> Option<f64> {
        let objective = self.objective();
        let value = node.objective_value(objective.field)?;
        Some(match objective.direction {
            Direction::Maximize => value,
            Direction::Minimize => -value,
        })
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaximizeSuccess => write!(f, "maximize_success"),
            Self::MinimizeRisk => write!(f, "minimize_risk"),
            Self::MinimizeAbandonment => write!(f, "minimize_abandonment"),
        }
    }
}

/// Run lifecycle state. `Completed` and `Failed` are terminal and freeze the
/// run against further writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still exploring.
    Running,
    /// Terminated normally (convergence, depth limit, or cancellation).
    Completed,
    /// Terminated because a whole level produced zero viable children.
    Failed,
}

impl RunStatus {
    /// True for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One evaluated point in the exploration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioNode {
    /// Node identifier, unique within the run.
    pub id: NodeId,
    /// Parent node; `None` for the root.
    pub parent_id: Option<NodeId>,
    /// Depth in the tree; the root is 0.
    pub depth: usize,
    /// The scorecard this node was evaluated with.
    pub scorecard: Scorecard,
    /// The modifiers this node was evaluated with.
    pub modifiers: ScenarioModifiers,
    /// Label of the action that produced this node; `None` for the root.
    pub action_applied: Option<String>,
    /// Oracle rationale for the action; `None` for the root.
    pub rationale: Option<String>,
    /// Simulated outcome.
    pub outcome: OutcomeBundle,
    /// Whether a sibling dominated this node during pruning.
    pub dominated: bool,
}

impl ObjectiveValues for ScenarioNode {
    fn objective_value(&self, field: ObjectiveField) -> Option<f64> {
        let value = match field {
            ObjectiveField::SuccessRate => self.outcome.success_rate,
            ObjectiveField::FailedRate => self.outcome.failed_rate,
            ObjectiveField::DidNotTryRate => self.outcome.did_not_try_rate,
            ObjectiveField::ComplexityScore => self.scorecard.score(Dimension::Complexity),
            ObjectiveField::PerceivedRiskScore => self.scorecard.score(Dimension::PerceivedRisk),
        };
        value.is_finite().then_some(value)
    }
}

/// Exploration configuration, validated before any simulation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationConfig {
    /// Surviving nodes carried from one depth to the next.
    pub beam_width: usize,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Candidate actions requested from the oracle per node.
    pub branch_factor: usize,
    /// Maximum in-flight oracle calls.
    pub oracle_concurrency: usize,
    /// Per-call oracle timeout in milliseconds.
    pub oracle_timeout_ms: u64,
    /// Monte Carlo settings shared by every evaluation in the run.
    pub monte_carlo: MonteCarloConfig,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            beam_width: 3,
            max_depth: 3,
            branch_factor: 3,
            oracle_concurrency: 2,
            oracle_timeout_ms: 30_000,
            monte_carlo: MonteCarloConfig::default(),
        }
    }
}

impl ExplorationConfig {
    /// Validates all fields.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigurationError` found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.beam_width == 0 {
            return Err(ConfigurationError::InvalidBeamWidth {
                value: self.beam_width,
            });
        }
        if self.max_depth == 0 {
            return Err(ConfigurationError::InvalidMaxDepth {
                value: self.max_depth,
            });
        }
        if self.branch_factor == 0 {
            return Err(ConfigurationError::InvalidBranchFactor {
                value: self.branch_factor,
            });
        }
        self.monte_carlo.validate()
    }
}

/// One exploration run: arena of nodes plus lifecycle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationRun {
    /// Run identifier.
    pub id: RunId,
    /// Optimization goal.
    pub goal: Goal,
    /// Beam width used by the explorer.
    pub beam_width: usize,
    /// Maximum depth used by the explorer.
    pub max_depth: usize,
    /// Lifecycle state.
    status: RunStatus,
    /// All nodes reachable from the root, in allocation order.
    nodes: Vec<ScenarioNode>,
    /// Best node by goal ranking, set when the run terminates.
    best_node_id: Option<NodeId>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExplorationRun {
    /// Creates a running, empty run.
    #[must_use]
    pub fn new(goal: Goal, beam_width: usize, max_depth: usize) -> Self {
        Self {
            id: RunId::new(),
            goal,
            beam_width,
            max_depth,
            status: RunStatus::Running,
            nodes: Vec::new(),
            best_node_id: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Best node id, if the run has terminated with one.
    #[must_use]
    pub const fn best_node_id(&self) -> Option<NodeId> {
        self.best_node_id
    }

    /// All nodes in allocation order.
    #[must_use]
    pub fn nodes(&self) -> &[ScenarioNode] {
        &self.nodes
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&ScenarioNode> {
        // Ids are allocation indexes; fall back to a scan for robustness
        // against deserialized runs.
        match self.nodes.get(id.0 as usize) {
            Some(n) if n.id == id => Some(n),
            _ => self.nodes.iter().find(|n| n.id == id),
        }
    }

    /// Next node id to allocate.
    #[must_use]
    pub fn next_node_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u64)
    }

    /// Appends an evaluated node.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the run is already terminal; terminal
    /// runs are frozen.
    pub fn append(&mut self, node: ScenarioNode) -> ExploreResult<NodeId> {
        if self.status.is_terminal() {
            return Err(ExploreError::internal(format!(
                "run {} is {} and frozen",
                self.id, self.status
            )));
        }
        let id = node.id;
        self.nodes.push(node);
        Ok(id)
    }

    /// Flags the nodes a pruning pass found dominated.
    pub(crate) fn mark_dominated(&mut self, ids: &[NodeId]) {
        for id in ids {
            if let Some(node) = self.nodes.get_mut(id.0 as usize) {
                node.dominated = true;
            }
        }
    }

    /// Walks parent links from `id` to the root, returning the root-first
    /// path.
    #[must_use]
    pub fn path_to(&self, id: NodeId) -> Vec<&ScenarioNode> {
        let mut path = Vec::new();
        let mut cursor = self.node(id);
        while let Some(node) = cursor {
            path.push(node);
            cursor = node.parent_id.and_then(|p| self.node(p));
        }
        path.reverse();
        path
    }

    /// Terminates the run as completed with its best node.
    pub(crate) fn complete(&mut self, best_node_id: Option<NodeId>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = RunStatus::Completed;
        self.best_node_id = best_node_id;
        self.finished_at = Some(Utc::now());
    }

    /// Terminates the run as failed, preserving all evaluated nodes.
    pub(crate) fn fail(&mut self, best_node_id: Option<NodeId>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = RunStatus::Failed;
        self.best_node_id = best_node_id;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;

    fn bundle(success: f64) -> OutcomeBundle {
        OutcomeBundle {
            trial_count: 1_000,
            skipped_trials: 0,
            did_not_try_rate: 1.0 - success,
            failed_rate: 0.0,
            success_rate: success,
            attributions: BTreeMap::new(),
            partial_dependence: BTreeMap::new(),
            clusters: Vec::new(),
            outliers: BTreeSet::new(),
        }
    }

    fn node(id: u64, parent: Option<u64>, depth: usize, success: f64) -> ScenarioNode {
        ScenarioNode {
            id: NodeId(id),
            parent_id: parent.map(NodeId),
            depth,
            scorecard: Scorecard::from_scores(&[(Dimension::Complexity, 0.5)], "test").unwrap(),
            modifiers: ScenarioModifiers::neutral(),
            action_applied: None,
            rationale: None,
            outcome: bundle(success),
            dominated: false,
        }
    }

    #[test]
    fn config_validation_catches_zero_fields() {
        let mut cfg = ExplorationConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.beam_width = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigurationError::InvalidBeamWidth { .. })
        ));
        cfg.beam_width = 3;
        cfg.max_depth = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigurationError::InvalidMaxDepth { .. })
        ));
    }

    #[test]
    fn append_allocates_sequential_ids() {
        let mut run = ExplorationRun::new(Goal::MaximizeSuccess, 3, 2);
        assert_eq!(run.next_node_id(), NodeId(0));
        run.append(node(0, None, 0, 0.2)).unwrap();
        assert_eq!(run.next_node_id(), NodeId(1));
        run.append(node(1, Some(0), 1, 0.3)).unwrap();
        assert_eq!(run.node(NodeId(1)).unwrap().parent_id, Some(NodeId(0)));
    }

    #[test]
    fn terminal_run_is_frozen() {
        let mut run = ExplorationRun::new(Goal::MaximizeSuccess, 3, 2);
        run.append(node(0, None, 0, 0.2)).unwrap();
        run.complete(Some(NodeId(0)));
        assert_eq!(run.status(), RunStatus::Completed);
        assert!(run.append(node(1, Some(0), 1, 0.3)).is_err());

        // Terminal transitions are final.
        run.fail(None);
        assert_eq!(run.status(), RunStatus::Completed);
        assert_eq!(run.best_node_id(), Some(NodeId(0)));
    }

    #[test]
    fn path_walks_parent_links_root_first() {
        let mut run = ExplorationRun::new(Goal::MaximizeSuccess, 3, 3);
        run.append(node(0, None, 0, 0.2)).unwrap();
        run.append(node(1, Some(0), 1, 0.3)).unwrap();
        run.append(node(2, Some(0), 1, 0.25)).unwrap();
        run.append(node(3, Some(1), 2, 0.4)).unwrap();

        let path = run.path_to(NodeId(3));
        let ids: Vec<u64> = path.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![0, 1, 3]);
    }

    #[test]
    fn goal_ranking_orders_by_direction() {
        let better = node(0, None, 0, 0.6);
        let worse = node(1, None, 0, 0.4);
        let g = Goal::MaximizeSuccess;
        assert!(g.ranking_key(&better).unwrap() > g.ranking_key(&worse).unwrap());

        // MinimizeAbandonment prefers the lower did-not-try rate.
        let g = Goal::MinimizeAbandonment;
        assert!(g.ranking_key(&better).unwrap() > g.ranking_key(&worse).unwrap());
    }

    #[test]
    fn ranking_key_reads_the_goal_objective_field() {
        let n = node(0, None, 0, 0.6);
        for goal in [
            Goal::MaximizeSuccess,
            Goal::MinimizeRisk,
            Goal::MinimizeAbandonment,
        ] {
            let objective = goal.objective();
            let value = n.objective_value(objective.field).unwrap();
            let expected = match objective.direction {
                Direction::Maximize => value,
                Direction::Minimize => -value,
            };
            assert_eq!(goal.ranking_key(&n), Some(expected), "goal {goal}");
        }
        assert_eq!(
            Goal::MinimizeAbandonment.objective(),
            Objective::new(ObjectiveField::DidNotTryRate, Direction::Minimize)
        );
    }

    #[test]
    fn run_serialization_round_trips() {
        let mut run = ExplorationRun::new(Goal::MinimizeRisk, 2, 2);
        run.append(node(0, None, 0, 0.2)).unwrap();
        run.complete(Some(NodeId(0)));
        let json = serde_json::to_string(&run).unwrap();
        let back: ExplorationRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status(), RunStatus::Completed);
        assert_eq!(back.nodes().len(), 1);
        assert_eq!(back.best_node_id(), Some(NodeId(0)));
    }
}
