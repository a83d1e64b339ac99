//! Statistical and structural properties of the Monte Carlo engine, checked
//! through the public API.

use std::sync::Arc;

use adoptsim::monte_carlo::dimension_dependence;
use adoptsim::explore::{EvalCache, EvalKey};
use adoptsim::{
    dominates, Dimension, Direction, InMemoryPopulation, MonteCarloConfig, MonteCarloEngine,
    Objective, ObjectiveField, ObjectiveValues, Scorecard, ScenarioModifiers,
};

fn baseline() -> Scorecard {
    Scorecard::from_scores(
        &[
            (Dimension::Complexity, 0.6),
            (Dimension::InitialEffort, 0.5),
            (Dimension::PerceivedRisk, 0.6),
            (Dimension::TimeToValue, 0.4),
        ],
        "property baseline",
    )
    .unwrap()
}

#[test]
fn identical_inputs_and_seed_reproduce_the_bundle_exactly() {
    let pop = InMemoryPopulation::synthetic(120);
    let config = MonteCarloConfig {
        seed: 4242,
        ..MonteCarloConfig::default()
    };
    let engine = MonteCarloEngine::new(config).unwrap();

    let first = engine
        .run(pop.members(), &baseline(), &ScenarioModifiers::neutral())
        .unwrap();
    let second = engine
        .run(pop.members(), &baseline(), &ScenarioModifiers::neutral())
        .unwrap();

    // Full structural equality: rates, attributions, partial dependence,
    // clusters, and outliers all reproduce.
    assert_eq!(first, second);
}

#[test]
fn outcome_rates_sum_to_one_across_configurations() {
    let pop = InMemoryPopulation::synthetic(75);
    for (trials, seed) in [(1_000, 0), (2_000, 7), (5_000, 31)] {
        let engine = MonteCarloEngine::new(MonteCarloConfig {
            trial_count: trials,
            seed,
            ..MonteCarloConfig::default()
        })
        .unwrap();
        let bundle = engine
            .run(pop.members(), &baseline(), &ScenarioModifiers::neutral())
            .unwrap();
        assert!(
            bundle.rates_are_consistent(),
            "rates drift for trials={trials} seed={seed}"
        );
        assert_eq!(bundle.trial_count + bundle.skipped_trials, trials);
    }
}

#[test]
fn success_rate_is_monotone_in_complexity() {
    let pop = InMemoryPopulation::synthetic(100);
    let config = MonteCarloConfig::default();
    let grid = [0.1, 0.3, 0.5, 0.7, 0.9];

    let curve = dimension_dependence(
        pop.members(),
        &baseline(),
        &ScenarioModifiers::neutral(),
        &config,
        Dimension::Complexity,
        &grid,
    )
    .expect("sweep over a valid grid");

    assert_eq!(curve.len(), grid.len());
    // Paired random draws per grid point make the curve exactly, not just
    // statistically, non-increasing.
    for pair in curve.windows(2) {
        assert!(
            pair[1].1 <= pair[0].1 + 1e-12,
            "success rate rose with complexity: {pair:?}"
        );
    }
}

#[test]
fn higher_risk_depresses_trying() {
    let pop = InMemoryPopulation::synthetic(100);
    let engine = MonteCarloEngine::new(MonteCarloConfig::default()).unwrap();
    let low_risk = baseline().apply(
        &[adoptsim::DimensionDelta::new(Dimension::PerceivedRisk, -0.4)],
        "derisk",
    );
    let high_risk = baseline().apply(
        &[adoptsim::DimensionDelta::new(Dimension::PerceivedRisk, 0.3)],
        "scarier",
    );

    let low = engine
        .run(pop.members(), &low_risk, &ScenarioModifiers::neutral())
        .unwrap();
    let high = engine
        .run(pop.members(), &high_risk, &ScenarioModifiers::neutral())
        .unwrap();
    assert!(
        high.did_not_try_rate > low.did_not_try_rate,
        "risk 0.9 should deter more members than risk 0.2"
    );
}

#[test]
fn literal_dominance_example() {
    // A = {success 0.6, risk 0.2} dominates B = {success 0.5, risk 0.3}.
    struct Point {
        success: f64,
        risk: f64,
    }
    impl ObjectiveValues for Point {
        fn objective_value(&self, field: ObjectiveField) -> Option<f64> {
            match field {
                ObjectiveField::SuccessRate => Some(self.success),
                ObjectiveField::PerceivedRiskScore => Some(self.risk),
                _ => None,
            }
        }
    }
    let objectives = [
        Objective::new(ObjectiveField::SuccessRate, Direction::Maximize),
        Objective::new(ObjectiveField::PerceivedRiskScore, Direction::Minimize),
    ];
    let a = Point {
        success: 0.6,
        risk: 0.2,
    };
    let b = Point {
        success: 0.5,
        risk: 0.3,
    };
    assert!(dominates(&a, &b, &objectives));
    assert!(!dominates(&b, &a, &objectives));
}

#[test]
fn cache_hits_are_bit_identical() {
    let pop = InMemoryPopulation::synthetic(50);
    let engine = MonteCarloEngine::new(MonteCarloConfig::default()).unwrap();
    let cache = EvalCache::new();
    let card = baseline();
    let modifiers = ScenarioModifiers::neutral();

    let key = EvalKey::compute(&card, &modifiers, engine.config().trial_count);
    let first = cache
        .get_or_compute(key, || engine.run(pop.members(), &card, &modifiers))
        .unwrap();
    let second = cache
        .get_or_compute(key, || panic!("hit must not recompute"))
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second), "hits share one allocation");
    assert_eq!(cache.hits(), 1);
    assert_eq!(cache.misses(), 1);
}

#[test]
fn skipped_trials_never_leak_into_rates() {
    let mut members = InMemoryPopulation::synthetic(20).members().to_vec();
    members[3].risk_tolerance = f64::NAN;
    members[11].effort_tolerance = f64::INFINITY;

    let engine = MonteCarloEngine::new(MonteCarloConfig::default()).unwrap();
    let bundle = engine
        .run(&members, &baseline(), &ScenarioModifiers::neutral())
        .unwrap();

    // Two of twenty members own a tenth of the trials.
    assert_eq!(bundle.skipped_trials, 200);
    assert_eq!(bundle.trial_count, 1_800);
    assert!(bundle.rates_are_consistent());
}

#[test]
fn clusters_partition_counted_members() {
    let pop = InMemoryPopulation::synthetic(100);
    let engine = MonteCarloEngine::new(MonteCarloConfig::default()).unwrap();
    let bundle = engine
        .run(pop.members(), &baseline(), &ScenarioModifiers::neutral())
        .unwrap();

    let mut seen = std::collections::BTreeSet::new();
    for cluster in &bundle.clusters {
        for &id in &cluster.member_ids {
            assert!(seen.insert(id), "member {id} assigned to two clusters");
        }
    }
    assert_eq!(seen.len(), 100, "every member lands in exactly one cluster");
    // Outliers are members, not free-floating ids.
    for id in &bundle.outliers {
        assert!(seen.contains(id));
    }
}
