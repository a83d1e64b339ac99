//! The action-proposal oracle seam.
//!
//! The oracle is an injected strategy backed by a generative text model in
//! production; the engine only sees the [`ActionOracle`] trait. Calls are
//! I/O-bound and unreliable, so the [`OracleGate`] bounds in-flight calls and
//! applies a per-call timeout, turning a late or failed call into "no
//! candidates from this branch" instead of failing the run.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::OracleError;
use crate::explore::{Goal, NodeId};
use crate::modifiers::{ModifierShift, ScenarioModifiers};
use crate::scorecard::{DimensionDelta, Scorecard};

/// One candidate modification proposed by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionProposal {
    /// Short action label, used as the rule tag on touched dimensions.
    pub label: String,
    /// Scorecard changes.
    pub dimension_deltas: Vec<DimensionDelta>,
    /// Situational changes carried by the action (e.g. onboarding adds
    /// trust).
    #[serde(default)]
    pub modifier_shift: ModifierShift,
    /// Natural-language rationale from the proposing model.
    pub rationale: String,
}

/// A step already taken on the path to the current node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Action label, `None` for the root.
    pub action: Option<String>,
    /// Success rate the step achieved.
    pub success_rate: f64,
}

/// Everything the oracle sees when asked for candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalContext {
    /// Node being expanded.
    pub node_id: NodeId,
    /// Depth of that node.
    pub depth: usize,
    /// The node's scorecard.
    pub scorecard: Scorecard,
    /// The node's modifiers.
    pub modifiers: ScenarioModifiers,
    /// Root-first ancestor history including the node itself.
    pub history: Vec<HistoryEntry>,
    /// The run's goal.
    pub goal: Goal,
    /// Maximum number of candidates wanted.
    pub branch_factor: usize,
}

/// Proposes candidate scorecard modifications.
///
/// Implementations may block on network I/O; the engine never calls this
/// directly, only through the [`OracleGate`]. A returned `Err` is the
/// failure reason; node context is attached by the gate.
pub trait ActionOracle: Send + Sync {
    /// Proposes up to `ctx.branch_factor` candidate actions.
    ///
    /// # Errors
    ///
    /// Returns the failure reason when no proposals can be produced.
    fn propose(&self, ctx: &ProposalContext) -> Result<Vec<ActionProposal>, String>;
}

/// Deterministic scripted oracle for tests and replays.
///
/// `script[d]` is returned for every node expanded at depth `d`; depths past
/// the script's end yield no proposals.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    script: Vec<Vec<ActionProposal>>,
}

impl ScriptedOracle {
    /// Creates an oracle from a per-depth script.
    #[must_use]
    pub fn new(script: Vec<Vec<ActionProposal>>) -> Self {
        Self { script }
    }
}

impl ActionOracle for ScriptedOracle {
    fn propose(&self, ctx: &ProposalContext) -> Result<Vec<ActionProposal>, String> {
        Ok(self.script.get(ctx.depth).cloned().unwrap_or_default())
    }
}

/// Bounds in-flight oracle calls and applies a per-call timeout.
pub(crate) struct OracleGate {
    oracle: Arc<dyn ActionOracle>,
    concurrency: usize,
    timeout: Duration,
}

impl OracleGate {
    pub(crate) fn new(
        oracle: Arc<dyn ActionOracle>,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Calls the oracle for every context, at most `concurrency` in flight.
    ///
    /// Each call runs on its own thread with a per-call timeout; a call that
    /// outlives the timeout keeps running detached and its late reply lands
    /// in a dropped channel. Results are positionally aligned with
    /// `contexts`. Errors are reported per branch, never raised.
    pub(crate) fn propose_all(
        &self,
        contexts: Vec<ProposalContext>,
    ) -> Vec<Result<Vec<ActionProposal>, OracleError>> {
        let mut results = Vec::with_capacity(contexts.len());
        for chunk in contexts.chunks(self.concurrency) {
            let mut in_flight = Vec::with_capacity(chunk.len());
            for ctx in chunk {
                let node_id = ctx.node_id;
                let depth = ctx.depth;
                let branch_factor = ctx.branch_factor;
                let (tx, rx) = bounded::<Result<Vec<ActionProposal>, String>>(1);
                let oracle = Arc::clone(&self.oracle);
                let ctx = ctx.clone();
                let spawned = thread::Builder::new()
                    .name("adoptsim-oracle".to_string())
                    .spawn(move || {
                        let _ = tx.send(oracle.propose(&ctx));
                    });
                in_flight.push((node_id, depth, branch_factor, rx, spawned.is_ok()));
            }

            for (node_id, depth, branch_factor, rx, spawned) in in_flight {
                let result = if !spawned {
                    Err(OracleError::Failure {
                        node_id,
                        depth,
                        reason: "failed to spawn oracle call thread".to_string(),
                    })
                } else {
                    match rx.recv_timeout(self.timeout) {
                        Ok(Ok(mut proposals)) => {
                            proposals.truncate(branch_factor);
                            Ok(proposals)
                        }
                        Ok(Err(reason)) => Err(OracleError::Failure {
                            node_id,
                            depth,
                            reason,
                        }),
                        Err(_) => Err(OracleError::Timeout {
                            node_id,
                            depth,
                            waited_ms: self.timeout.as_millis().min(u128::from(u64::MAX)) as u64,
                        }),
                    }
                };
                if let Err(err) = &result {
                    warn!(error = %err, "oracle branch yielded no candidates");
                }
                results.push(result);
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorecard::Dimension;

    fn ctx(depth: usize) -> ProposalContext {
        ProposalContext {
            node_id: NodeId(0),
            depth,
            scorecard: Scorecard::from_scores(&[(Dimension::Complexity, 0.8)], "test").unwrap(),
            modifiers: ScenarioModifiers::neutral(),
            history: vec![HistoryEntry {
                action: None,
                success_rate: 0.2,
            }],
            goal: Goal::MaximizeSuccess,
            branch_factor: 2,
        }
    }

    fn proposal(label: &str) -> ActionProposal {
        ActionProposal {
            label: label.to_string(),
            dimension_deltas: vec![DimensionDelta::new(Dimension::Complexity, -0.1)],
            modifier_shift: ModifierShift::none(),
            rationale: format!("{label} rationale"),
        }
    }

    #[test]
    fn scripted_oracle_follows_depth_script() {
        let oracle = ScriptedOracle::new(vec![
            vec![proposal("a"), proposal("b")],
            vec![proposal("c")],
        ]);
        assert_eq!(oracle.propose(&ctx(0)).unwrap().len(), 2);
        assert_eq!(oracle.propose(&ctx(1)).unwrap()[0].label, "c");
        assert!(oracle.propose(&ctx(2)).unwrap().is_empty());
    }

    #[test]
    fn gate_truncates_to_branch_factor() {
        let oracle = ScriptedOracle::new(vec![vec![
            proposal("a"),
            proposal("b"),
            proposal("c"),
        ]]);
        let gate = OracleGate::new(Arc::new(oracle), 2, Duration::from_secs(5));
        let results = gate.propose_all(vec![ctx(0)]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().len(), 2);
    }

    #[test]
    fn gate_times_out_hung_oracle() {
        struct HungOracle;
        impl ActionOracle for HungOracle {
            fn propose(&self, _ctx: &ProposalContext) -> Result<Vec<ActionProposal>, String> {
                thread::sleep(Duration::from_secs(10));
                Ok(Vec::new())
            }
        }
        let gate = OracleGate::new(Arc::new(HungOracle), 1, Duration::from_millis(50));
        let results = gate.propose_all(vec![ctx(0)]);
        assert!(matches!(results[0], Err(OracleError::Timeout { .. })));
    }

    #[test]
    fn gate_wraps_failure_with_node_context() {
        struct FailingOracle;
        impl ActionOracle for FailingOracle {
            fn propose(&self, _ctx: &ProposalContext) -> Result<Vec<ActionProposal>, String> {
                Err("model unavailable".to_string())
            }
        }
        let gate = OracleGate::new(Arc::new(FailingOracle), 1, Duration::from_secs(1));
        let results = gate.propose_all(vec![ctx(0)]);
        match &results[0] {
            Err(OracleError::Failure { node_id, reason, .. }) => {
                assert_eq!(*node_id, NodeId(0));
                assert!(reason.contains("unavailable"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn proposal_serialization_defaults_modifier_shift() {
        let json = r#"{
            "label": "reduce_complexity",
            "dimension_deltas": [{"dimension": "complexity", "delta": -0.3}],
            "rationale": "simpler flows convert better"
        }"#;
        let p: ActionProposal = serde_json::from_str(json).unwrap();
        assert!(p.modifier_shift.is_none());
    }
}
