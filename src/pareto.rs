//! Multi-objective (Pareto) comparison of evaluated scenarios.
//!
//! `a` dominates `b` iff `a` is at least as good on every objective and
//! strictly better on at least one. The evaluator is pure and total: it never
//! raises, and a missing or non-finite value makes that side non-dominating.
//! Goal-based tie breaking happens at ranking time, never inside dominance.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::outcome::OutcomeBundle;
use crate::scorecard::Dimension;

/// The comparable fields an objective can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveField {
    /// Simulated success rate.
    SuccessRate,
    /// Simulated failure rate.
    FailedRate,
    /// Simulated did-not-try rate.
    DidNotTryRate,
    /// The scorecard's complexity score.
    ComplexityScore,
    /// The scorecard's perceived-risk score.
    PerceivedRiskScore,
}

impl fmt::Display for ObjectiveField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuccessRate => write!(f, "success_rate"),
            Self::FailedRate => write!(f, "failed_rate"),
            Self::DidNotTryRate => write!(f, "did_not_try_rate"),
            Self::ComplexityScore => write!(f, "complexity_score"),
            Self::PerceivedRiskScore => write!(f, "perceived_risk_score"),
        }
    }
}

/// Preferred direction for an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Higher is better.
    Maximize,
    /// Lower is better.
    Minimize,
}

/// One objective: a field and its preferred direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Objective {
    /// Field to compare.
    pub field: ObjectiveField,
    /// Preferred direction.
    pub direction: Direction,
}

impl Objective {
    /// Convenience constructor.
    #[must_use]
    pub const fn new(field: ObjectiveField, direction: Direction) -> Self {
        Self { field, direction }
    }

    /// The standard objective set: maximize success, minimize failure,
    /// complexity, and perceived risk.
    #[must_use]
    pub const fn standard() -> [Self; 4] {
        [
            Self::new(ObjectiveField::SuccessRate, Direction::Maximize),
            Self::new(ObjectiveField::FailedRate, Direction::Minimize),
            Self::new(ObjectiveField::ComplexityScore, Direction::Minimize),
            Self::new(ObjectiveField::PerceivedRiskScore, Direction::Minimize),
        ]
    }
}

/// Read access to objective values.
///
/// Implemented by anything comparable under Pareto dominance. A `None` means
/// the value is unavailable on that side (e.g. an [`OutcomeBundle`] has no
/// scorecard-backed fields).
pub trait ObjectiveValues {
    /// The value of `field`, if available and finite.
    fn objective_value(&self, field: ObjectiveField) -> Option<f64>;
}

impl ObjectiveValues for OutcomeBundle {
    fn objective_value(&self, field: ObjectiveField) -> Option<f64> {
        let value = match field {
            ObjectiveField::SuccessRate => self.success_rate,
            ObjectiveField::FailedRate => self.failed_rate,
            ObjectiveField::DidNotTryRate => self.did_not_try_rate,
            ObjectiveField::ComplexityScore | ObjectiveField::PerceivedRiskScore => {
                return None;
            }
        };
        value.is_finite().then_some(value)
    }
}

/// An outcome bundle paired with the scorecard that produced it, so all four
/// objective fields are comparable.
#[derive(Debug, Clone)]
pub struct EvaluatedScorecard<'a> {
    /// The scorecard under evaluation.
    pub scorecard: &'a crate::scorecard::Scorecard,
    /// Its simulated outcome.
    pub outcome: &'a OutcomeBundle,
}

impl ObjectiveValues for EvaluatedScorecard<'_> {
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

/// Returns true iff `a` dominates `b` under `objectives`.
///
/// Total: degenerate input (empty objectives, missing values) returns false.
pub fn dominates<A, B>(a: &A, b: &B, objectives: &[Objective]) -> bool
where
    A: ObjectiveValues + ?Sized,
    B: ObjectiveValues + ?Sized,
{
    if objectives.is_empty() {
        return false;
    }
    let mut strictly_better = false;
    for objective in objectives {
        let (Some(va), Some(vb)) = (
            a.objective_value(objective.field),
            b.objective_value(objective.field),
        ) else {
            return false;
        };
        let (better, worse) = match objective.direction {
            Direction::Maximize => (va > vb, va < vb),
            Direction::Minimize => (va < vb, va > vb),
        };
        if worse {
            return false;
        }
        if better {
            strictly_better = true;
        }
    }
    strictly_better
}
