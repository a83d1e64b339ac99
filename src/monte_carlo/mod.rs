//! Monte Carlo evaluation of a scorecard against a population.
//!
//! The engine is stateless and side-effect-free given its inputs: the same
//! `(population, scorecard, modifiers, config)` always produces the same
//! [`OutcomeBundle`]. Each trial reseeds its own rng from `(seed, trial
//! index)` so trials are independent and any single trial can be replayed.

mod cluster;
mod explain;

pub use explain::dimension_dependence;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::behavior::simulate_trial;
use crate::error::{ConfigurationError, SimError};
use crate::modifiers::ScenarioModifiers;
use crate::outcome::{Outcome, OutcomeBundle};
use crate::population::{Attribute, PopulationMember};
use crate::scorecard::Scorecard;

/// Bounds on the configurable trial count.
pub const MIN_TRIALS: usize = 1_000;
/// Upper bound on the configurable trial count.
pub const MAX_TRIALS: usize = 10_000;

/// Monte Carlo engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MonteCarloConfig {
    /// Trials for the main outcome tally, in `[MIN_TRIALS, MAX_TRIALS]`.
    pub trial_count: usize,
    /// Reduced trial count used by attribution and partial dependence.
    pub explain_trial_count: usize,
    /// Grid points per attribute for partial dependence.
    pub pdp_grid_points: usize,
    /// Fixed cluster count; `None` derives it from population size.
    pub cluster_k: Option<usize>,
    /// Z-score threshold (scaled by 10 to keep the config hashable; 25
    /// means 2.5 standard deviations).
    pub outlier_z_tenths: u32,
    /// Base seed for all random streams.
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            trial_count: 2_000,
            explain_trial_count: 500,
            pdp_grid_points: 5,
            cluster_k: None,
            outlier_z_tenths: 25,
            seed: 0,
        }
    }
}

impl MonteCarloConfig {
    /// Validates the trial-count range.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::TrialCountOutOfRange` when `trial_count`
    /// is outside `[MIN_TRIALS, MAX_TRIALS]`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(MIN_TRIALS..=MAX_TRIALS).contains(&self.trial_count) {
            return Err(ConfigurationError::TrialCountOutOfRange {
                value: self.trial_count,
                min: MIN_TRIALS,
                max: MAX_TRIALS,
            });
        }
        Ok(())
    }

    /// Outlier threshold in standard deviations.
    #[must_use]
    pub fn outlier_z_threshold(&self) -> f64 {
        f64::from(self.outlier_z_tenths) / 10.0
    }

    /// Cluster count for a population of `n` members.
    #[must_use]
    pub fn cluster_count(&self, n: usize) -> usize {
        let k = self.cluster_k.unwrap_or((n / 25).clamp(2, 6));
        k.clamp(1, n.max(1))
    }
}

/// Per-member outcome counts accumulated during the main tally.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MemberTally {
    pub did_not_try: u32,
    pub failed: u32,
    pub success: u32,
}

impl MemberTally {
    pub(crate) fn total(&self) -> u32 {
        self.did_not_try + self.failed + self.success
    }

    /// Outcome frequencies `[did_not_try, failed, success]`.
    pub(crate) fn frequencies(&self) -> Option<[f64; 3]> {
        let total = f64::from(self.total());
        if total == 0.0 {
            return None;
        }
        Some([
            f64::from(self.did_not_try) / total,
            f64::from(self.failed) / total,
            f64::from(self.success) / total,
        ])
    }
}

pub(crate) struct Tally {
    pub counted: usize,
    pub skipped: usize,
    pub did_not_try: usize,
    pub failed: usize,
    pub success: usize,
    pub per_member: Vec<MemberTally>,
}

/// Mixes a base seed with a stream/trial index into an independent seed.
///
/// splitmix64 finalizer; any bias here would correlate trials.
pub(crate) fn derive_seed(base: u64, stream: u64, index: u64) -> u64 {
    let mut z = base
        .wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(index.wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Runs `trial_count` trials, looping the population, reseeding per trial.
///
/// `stream` separates the main tally from explainability reruns so they draw
/// from distinct random streams.
pub(crate) fn tally(
    population: &[PopulationMember],
    scorecard: &Scorecard,
    modifiers: &ScenarioModifiers,
    trial_count: usize,
    seed: u64,
    stream: u64,
) -> Result<Tally, SimError> {
    if population.is_empty() {
        return Err(SimError::EmptyPopulation);
    }

    let mut out = Tally {
        counted: 0,
        skipped: 0,
        did_not_try: 0,
        failed: 0,
        success: 0,
        per_member: vec![MemberTally::default(); population.len()],
    };

    for trial in 0..trial_count {
        let member = &population[trial % population.len()];
        let mut rng = StdRng::seed_from_u64(derive_seed(seed, stream, trial as u64));
        match simulate_trial(member, scorecard, modifiers, &mut rng) {
            Ok(outcome) => {
                out.counted += 1;
                let m = &mut out.per_member[trial % population.len()];
                match outcome {
                    Outcome::DidNotTry => {
                        out.did_not_try += 1;
                        m.did_not_try += 1;
                    }
                    Outcome::Failed => {
                        out.failed += 1;
                        m.failed += 1;
                    }
                    Outcome::Success => {
                        out.success += 1;
                        m.success += 1;
                    }
                }
            }
            // A member's trial is skipped and counted separately, never
            // folded into the outcome rates.
            Err(SimError::Trial { .. }) => out.skipped += 1,
            Err(other) => return Err(other),
        }
    }

    Ok(out)
}

/// Success rate of a reduced tally; used by explainability reruns.
pub(crate) fn success_rate(
    population: &[PopulationMember],
    scorecard: &Scorecard,
    modifiers: &ScenarioModifiers,
    trial_count: usize,
    seed: u64,
    stream: u64,
) -> Result<f64, SimError> {
    let t = tally(population, scorecard, modifiers, trial_count, seed, stream)?;
    if t.counted == 0 {
        return Err(SimError::Trial {
            member_id: 0,
            reason: "every trial was skipped".to_string(),
        });
    }
    Ok(t.success as f64 / t.counted as f64)
}

/// The Monte Carlo engine.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloEngine {
    config: MonteCarloConfig,
}

impl MonteCarloEngine {
    /// Creates an engine after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` for an out-of-range trial count.
    pub fn new(config: MonteCarloConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// Runs the full evaluation: outcome tally plus explainability
    /// artifacts.
    ///
    /// # Errors
    ///
    /// Returns `SimError::EmptyPopulation` for an empty population. Partial
    /// failures inside attribution or partial dependence are recorded as
    /// `None` for that attribute rather than aborting the run.
    pub fn run(
        &self,
        population: &[PopulationMember],
        scorecard: &Scorecard,
        modifiers: &ScenarioModifiers,
    ) -> Result<OutcomeBundle, SimError> {
        let cfg = &self.config;
        let main = tally(population, scorecard, modifiers, cfg.trial_count, cfg.seed, 0)?;
        if main.counted == 0 {
            return Err(SimError::Trial {
                member_id: 0,
                reason: "every trial was skipped".to_string(),
            });
        }

        let counted = main.counted as f64;
        let did_not_try_rate = main.did_not_try as f64 / counted;
        let failed_rate = main.failed as f64 / counted;
        let success_rate = main.success as f64 / counted;
        let base_success = success_rate;

        let mut attributions = BTreeMap::new();
        let mut partial_dependence = BTreeMap::new();
        for attr in Attribute::ALL {
            attributions.insert(
                attr,
                explain::attribution(population, scorecard, modifiers, cfg, attr),
            );
            partial_dependence.insert(
                attr,
                explain::partial_dependence(population, scorecard, modifiers, cfg, attr),
            );
        }

        let (clusters, outliers) = cluster::cluster_members(
            population,
            &main.per_member,
            cfg.cluster_count(population.len()),
            cfg.outlier_z_threshold(),
        );

        debug!(
            trials = main.counted,
            skipped = main.skipped,
            success_rate = base_success,
            clusters = clusters.len(),
            outliers = outliers.len(),
            "monte carlo run complete"
        );

        Ok(OutcomeBundle {
            trial_count: main.counted,
            skipped_trials: main.skipped,
            did_not_try_rate,
            failed_rate,
            success_rate,
            attributions,
            partial_dependence,
            clusters,
            outliers,
        })
    }
}
