//! The closed-form behavior model.
//!
//! One simulated trial of one member against a scorecard under scenario
//! modifiers. The model is deliberately simple and auditable; the constants
//! below are empirically calibrated, not derived, and live in one place so a
//! wholesale model replacement touches only this file. Any replacement must
//! stay deterministic given the caller's rng state.

use rand::Rng;

use crate::error::SimError;
use crate::modifiers::ScenarioModifiers;
use crate::outcome::Outcome;
use crate::population::PopulationMember;
use crate::scorecard::{Dimension, Scorecard};

/// Calibrated model constants.
mod consts {
    /// Scale applied to dimension scores in the capability/trust/friction
    /// terms.
    pub const DIMENSION_SCALE: f64 = 10.0;
    /// Weight of centered risk tolerance in the trust term.
    pub const RISK_TOLERANCE_WEIGHT: f64 = 1.0 / 5.0;
    /// Weight of centered effort tolerance in the friction term.
    pub const EFFORT_TOLERANCE_WEIGHT: f64 = 1.0 / 10.0;
    /// Base success factor before literacy scaling.
    pub const LITERACY_FLOOR: f64 = 0.6;
    /// Literacy contribution on top of the floor.
    pub const LITERACY_WEIGHT: f64 = 0.4;
    /// How strongly task criticality depresses success.
    pub const CRITICALITY_WEIGHT: f64 = 0.3;
    /// Time-to-value contribution to the success ceiling.
    pub const TIME_TO_VALUE_WEIGHT: f64 = 0.5;
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// The two branch probabilities of a trial: `(p_try, p_success)`.
///
/// Split out from [`simulate_trial`] so explainability code can reason about
/// probabilities without consuming random draws.
///
/// # Errors
///
/// Returns `SimError::Trial` when a member attribute is non-finite; the
/// caller skips that trial and counts it separately.
pub fn trial_probabilities(
    member: &PopulationMember,
    scorecard: &Scorecard,
    modifiers: &ScenarioModifiers,
) -> Result<(f64, f64), SimError> {
    let attrs = [
        member.digital_literacy,
        member.risk_tolerance,
        member.effort_tolerance,
    ];
    if attrs.iter().any(|a| !a.is_finite()) {
        return Err(SimError::Trial {
            member_id: member.id,
            reason: "non-finite member attribute".to_string(),
        });
    }

    let complexity = scorecard.score(Dimension::Complexity);
    let effort = scorecard.score(Dimension::InitialEffort);
    let risk = scorecard.score(Dimension::PerceivedRisk);
    let time_to_value = scorecard.score(Dimension::TimeToValue);

    let capability = 1.0 / (1.0 + complexity / consts::DIMENSION_SCALE);

    let trust = clamp01(
        1.0 / (1.0 + risk / consts::DIMENSION_SCALE)
            + modifiers.trust_delta
            + (member.risk_tolerance - 0.5) * consts::RISK_TOLERANCE_WEIGHT,
    );

    let friction_penalty = clamp01(
        effort / consts::DIMENSION_SCALE - modifiers.friction_delta
            - (member.effort_tolerance - 0.5) * consts::EFFORT_TOLERANCE_WEIGHT
            + member.device.friction(),
    );

    let p_try = clamp01(
        capability * trust * (1.0 - friction_penalty) * (1.0 + modifiers.motivation_delta),
    );

    let p_success = clamp01(
        (1.0 - time_to_value * consts::TIME_TO_VALUE_WEIGHT)
            * (consts::LITERACY_FLOOR + consts::LITERACY_WEIGHT * member.digital_literacy)
            * (1.0 - consts::CRITICALITY_WEIGHT * modifiers.task_criticality),
    );

    Ok((p_try, p_success))
}

/// Simulates one trial. Deterministic given the rng state: the same seed
/// reproduces the same outcome.
///
/// # Errors
///
/// Returns `SimError::Trial` when the member's attributes make the
/// probabilities uncomputable.
pub fn simulate_trial<R: Rng>(
    member: &PopulationMember,
    scorecard: &Scorecard,
    modifiers: &ScenarioModifiers,
    rng: &mut R,
) -> Result<Outcome, SimError> {
    let (p_try, p_success) = trial_probabilities(member, scorecard, modifiers)?;

    let u1: f64 = rng.gen();
    if u1 > p_try {
        return Ok(Outcome::DidNotTry);
    }
    let u2: f64 = rng.gen();
    if u2 > p_success {
        return Ok(Outcome::Failed);
    }
    Ok(Outcome::Success)
}
