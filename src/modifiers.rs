//! Scenario modifiers: situational context orthogonal to the scorecard.
//!
//! Modifiers represent the circumstances of use ("first use", "crisis",
//! "guided onboarding") and are combined additively with scorecard-derived
//! quantities at simulation time.

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Situational context for a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioModifiers {
    /// Additive shift to the probability of trying at all.
    pub motivation_delta: f64,
    /// Additive shift to trust.
    pub trust_delta: f64,
    /// Reduction of the friction penalty.
    pub friction_delta: f64,
    /// How critical the task is to the member, in [0.0, 1.0]. High
    /// criticality depresses success (stress, time pressure).
    pub task_criticality: f64,
}

impl ScenarioModifiers {
    /// Neutral modifiers: routine, non-critical use.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            motivation_delta: 0.0,
            trust_delta: 0.0,
            friction_delta: 0.0,
            task_criticality: 0.2,
        }
    }

    /// Validates the criticality range and that deltas are finite.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::CriticalityOutOfRange` when
    /// `task_criticality` is outside [0.0, 1.0] or any field is non-finite.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let finite = self.motivation_delta.is_finite()
            && self.trust_delta.is_finite()
            && self.friction_delta.is_finite()
            && self.task_criticality.is_finite();
        if !finite || !(0.0..=1.0).contains(&self.task_criticality) {
            return Err(ConfigurationError::CriticalityOutOfRange {
                value: self.task_criticality,
            });
        }
        Ok(())
    }

    /// Combines these modifiers with a proposal's modifier shift.
    ///
    /// Deltas add; criticality is taken from `self` (actions change the
    /// product, not how critical the member's task is) and stays clamped.
    #[must_use]
    pub fn shifted(&self, shift: &ModifierShift) -> Self {
        Self {
            motivation_delta: self.motivation_delta + shift.motivation_delta,
            trust_delta: self.trust_delta + shift.trust_delta,
            friction_delta: self.friction_delta + shift.friction_delta,
            task_criticality: self.task_criticality,
        }
    }
}

impl Default for ScenarioModifiers {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Modifier adjustments carried by an action proposal (e.g. "guided
/// onboarding" adds trust).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModifierShift {
    /// Additive motivation change.
    pub motivation_delta: f64,
    /// Additive trust change.
    pub trust_delta: f64,
    /// Additive friction reduction.
    pub friction_delta: f64,
}

impl ModifierShift {
    /// A shift that changes nothing.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            motivation_delta: 0.0,
            trust_delta: 0.0,
            friction_delta: 0.0,
        }
    }

    /// True if every field is zero.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.motivation_delta == 0.0 && self.trust_delta == 0.0 && self.friction_delta == 0.0
    }
}
