//! Exploration summary: best path extraction over a finished tree.
//!
//! Purely a read over the node arena; never re-runs simulations.

use serde::{Deserialize, Serialize};

use crate::explore::{ExplorationRun, NodeId, ScenarioNode};

/// Structured trace of an exploration's best result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorationSummary {
    /// Root-first path from the root to the best node. Empty when the run
    /// holds no nodes.
    pub best_path: Vec<ScenarioNode>,
    /// Total nodes evaluated, dominated ones included.
    pub total_nodes: usize,
    /// Success rate of the best node; 0.0 when the run holds no nodes.
    pub best_success_rate: f64,
}

/// Selects the best node: the highest goal-ranked non-dominated node at the
/// greatest depth that has one, ties broken by lower node id.
///
/// The same ranking the beam explorer uses between levels.
#[must_use]
pub fn select_best(run: &ExplorationRun) -> Option<NodeId> {
    let deepest = run
        .nodes()
        .iter()
        .filter(|n| !n.dominated)
        .map(|n| n.depth)
        .max()?;
    run.nodes()
        .iter()
        .filter(|n| !n.dominated && n.depth == deepest)
        .max_by(|a, b| {
            let ka = run.goal.ranking_key(a).unwrap_or(f64::NEG_INFINITY);
            let kb = run.goal.ranking_key(b).unwrap_or(f64::NEG_INFINITY);
            ka.partial_cmp(&kb)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Lower id wins a tie, so the higher id must compare less.
                .then(b.id.cmp(&a.id))
        })
        .map(|n| n.id)
}

/// Summarizes a run.
///
/// Uses the run's recorded best node when it terminated with one, otherwise
/// selects the best node by goal ranking over the current tree.
#[must_use]
pub fn summarize(run: &ExplorationRun) -> ExplorationSummary {
    let best = run.best_node_id().or_else(|| select_best(run));
    let best_path: Vec<ScenarioNode> = best
        .map(|id| run.path_to(id).into_iter().cloned().collect())
        .unwrap_or_default();
    let best_success_rate = best_path
        .last()
        .map_or(0.0, |n| n.outcome.success_rate);
    ExplorationSummary {
        best_path,
        total_nodes: run.nodes().len(),
        best_success_rate,
    }
}
