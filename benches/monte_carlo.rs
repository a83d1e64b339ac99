//! Monte Carlo engine throughput at representative population sizes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use adoptsim::{
    Dimension, InMemoryPopulation, MonteCarloConfig, MonteCarloEngine, ScenarioModifiers,
    Scorecard,
};

fn baseline() -> Scorecard {
    Scorecard::from_scores(
        &[
            (Dimension::Complexity, 0.8),
            (Dimension::InitialEffort, 0.7),
            (Dimension::PerceivedRisk, 0.85),
            (Dimension::TimeToValue, 0.6),
        ],
        "bench baseline",
    )
    .expect("valid baseline")
}

fn bench_engine_run(c: &mut Criterion) {
    let engine = MonteCarloEngine::new(MonteCarloConfig {
        trial_count: 2_000,
        explain_trial_count: 500,
        ..MonteCarloConfig::default()
    })
    .expect("valid config");
    let card = baseline();
    let modifiers = ScenarioModifiers::neutral();

    let mut group = c.benchmark_group("monte_carlo_run");
    for size in [100_usize, 1_000] {
        let population = InMemoryPopulation::synthetic(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &population, |b, pop| {
            b.iter(|| {
                engine
                    .run(black_box(pop.members()), black_box(&card), &modifiers)
                    .expect("bench run")
            });
        });
    }
    group.finish();
}

fn bench_tally_only(c: &mut Criterion) {
    // Tally without explainability: the cost the cache saves on a hit is the
    // full run, so the spread between these two benches is the explain
    // overhead.
    let engine = MonteCarloEngine::new(MonteCarloConfig {
        trial_count: 2_000,
        explain_trial_count: 500,
        pdp_grid_points: 2,
        cluster_k: Some(2),
        ..MonteCarloConfig::default()
    })
    .expect("valid config");
    let card = baseline();
    let modifiers = ScenarioModifiers::neutral();
    let population = InMemoryPopulation::synthetic(200);

    c.bench_function("monte_carlo_run_minimal_explain", |b| {
        b.iter(|| {
            engine
                .run(black_box(population.members()), &card, &modifiers)
                .expect("bench run")
        });
    });
}

criterion_group!(benches, bench_engine_run, bench_tally_only);
criterion_main!(benches);
