//! Trial outcomes and the aggregated result of a Monte Carlo run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::population::Attribute;

/// Result of a single simulated trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The member never attempted the feature.
    DidNotTry,
    /// The member attempted and failed.
    Failed,
    /// The member attempted and succeeded.
    Success,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DidNotTry => write!(f, "did_not_try"),
            Self::Failed => write!(f, "failed"),
            Self::Success => write!(f, "success"),
        }
    }
}

/// One behaviorally distinct population segment found by clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    /// Cluster index, stable within one bundle.
    pub index: usize,
    /// Member ids assigned to this cluster.
    pub member_ids: Vec<u64>,
    /// Mean per-member outcome frequencies `[did_not_try, failed, success]`.
    pub centroid: [f64; 3],
    /// Mean per-member success frequency (same as `centroid[2]`, kept as a
    /// named field for downstream reporting).
    pub mean_success_rate: f64,
}

impl ClusterSummary {
    /// Number of members in the cluster.
    #[must_use]
    pub fn size(&self) -> usize {
        self.member_ids.len()
    }
}

/// Aggregated result of one Monte Carlo run.
///
/// The three outcome rates are computed over counted (non-skipped) trials and
/// sum to 1.0 within floating-point tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeBundle {
    /// Trials that produced an outcome.
    pub trial_count: usize,
    /// Trials skipped because the behavior model raised a trial error.
    /// Never folded into the three outcome rates.
    pub skipped_trials: usize,
    /// Fraction of counted trials ending in `DidNotTry`.
    pub did_not_try_rate: f64,
    /// Fraction of counted trials ending in `Failed`.
    pub failed_rate: f64,
    /// Fraction of counted trials ending in `Success`.
    pub success_rate: f64,
    /// Leave-one-out contribution per attribute; `None` where the estimate
    /// degenerated (e.g. zero variance).
    pub attributions: BTreeMap<Attribute, Option<f64>>,
    /// Partial dependence per attribute: `(grid_value, marginal_success_rate)`
    /// pairs; `None` where the sweep degenerated.
    pub partial_dependence: BTreeMap<Attribute, Option<Vec<(f64, f64)>>>,
    /// Behaviorally distinct segments.
    pub clusters: Vec<ClusterSummary>,
    /// Members whose success frequency deviates beyond the z-score threshold
    /// from their cluster mean.
    pub outliers: BTreeSet<u64>,
}

impl OutcomeBundle {
    /// Tolerance for the rate-sum invariant.
    pub const RATE_SUM_TOLERANCE: f64 = 1e-9;

    /// Checks the rate-sum invariant.
    #[must_use]
    pub fn rates_are_consistent(&self) -> bool {
        let sum = self.did_not_try_rate + self.failed_rate + self.success_rate;
        (sum - 1.0).abs() <= Self::RATE_SUM_TOLERANCE
    }

    /// Rate of the given outcome.
    #[must_use]
    pub fn rate(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::DidNotTry => self.did_not_try_rate,
            Outcome::Failed => self.failed_rate,
            Outcome::Success => self.success_rate,
        }
    }
}
