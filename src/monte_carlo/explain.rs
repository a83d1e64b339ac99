//! Explainability artifacts: attribution and partial dependence.
//!
//! Both estimators rerun a reduced-trial-count simulation with paired random
//! streams, so the replaced run differs from its baseline only in the
//! attribute under study. A degenerate attribute (zero variance, or every
//! rerun trial skipped) yields `None` for that attribute instead of aborting
//! the whole bundle.

use std::collections::HashMap;

use crate::modifiers::ScenarioModifiers;
use crate::monte_carlo::{success_rate, MonteCarloConfig};
use crate::population::{Attribute, DeviceClass, PopulationMember};
use crate::scorecard::{Dimension, DimensionDelta, Scorecard};

/// Variance below which a numeric attribute is considered degenerate.
const VARIANCE_FLOOR: f64 = 1e-12;

fn stream_for(attr: Attribute, base: u64) -> u64 {
    let index = Attribute::ALL
        .iter()
        .position(|a| *a == attr)
        .unwrap_or(0) as u64;
    base + index
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Leave-one-out attribution for one attribute.
///
/// The attribute is replaced by the population mean (numeric) or mode
/// (categorical) across all members; the contribution is the drop in success
/// rate relative to a paired baseline rerun.
pub(crate) fn attribution(
    population: &[PopulationMember],
    scorecard: &Scorecard,
    modifiers: &ScenarioModifiers,
    cfg: &MonteCarloConfig,
    attr: Attribute,
) -> Option<f64> {
    let replaced: Vec<PopulationMember> = if attr.is_numeric() {
        let values: Vec<f64> = population.iter().filter_map(|m| m.numeric(attr)).collect();
        if values.len() != population.len() || variance(&values) < VARIANCE_FLOOR {
            return None;
        }
        let mean = mean(&values);
        population
            .iter()
            .map(|m| m.with_numeric(attr, mean))
            .collect()
    } else {
        let mut counts: HashMap<DeviceClass, usize> = HashMap::new();
        for m in population {
            *counts.entry(m.device).or_default() += 1;
        }
        if counts.len() < 2 {
            return None;
        }
        // Deterministic mode: break count ties on the friction ordering.
        let mode = *counts
            .iter()
            .max_by(|a, b| {
                a.1.cmp(b.1)
                    .then(a.0.friction().partial_cmp(&b.0.friction()).unwrap_or(std::cmp::Ordering::Equal))
            })
            .map(|(device, _)| device)?;
        population.iter().map(|m| m.with_device(mode)).collect()
    };

    let stream = stream_for(attr, 1);
    let base = success_rate(
        population,
        scorecard,
        modifiers,
        cfg.explain_trial_count,
        cfg.seed,
        stream,
    )
    .ok()?;
    let counterfactual = success_rate(
        &replaced,
        scorecard,
        modifiers,
        cfg.explain_trial_count,
        cfg.seed,
        stream,
    )
    .ok()?;
    Some(base - counterfactual)
}

/// Quantile grid of `points` values over `sorted` (ascending).
fn quantile_grid(sorted: &[f64], points: usize) -> Vec<f64> {
    let points = points.max(2);
    let mut grid: Vec<f64> = (0..points)
        .map(|i| {
            let q = i as f64 / (points - 1) as f64;
            let pos = q * (sorted.len() - 1) as f64;
            sorted[pos.round() as usize]
        })
        .collect();
    grid.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    grid
}

/// Partial dependence for one attribute: sweep its value across a quantile
/// grid, all other attributes held at their observed values.
///
/// Categorical attributes have no numeric grid and yield `None`.
pub(crate) fn partial_dependence(
    population: &[PopulationMember],
    scorecard: &Scorecard,
    modifiers: &ScenarioModifiers,
    cfg: &MonteCarloConfig,
    attr: Attribute,
) -> Option<Vec<(f64, f64)>> {
    if !attr.is_numeric() {
        return None;
    }
    let mut values: Vec<f64> = population.iter().filter_map(|m| m.numeric(attr)).collect();
    if values.len() != population.len() || variance(&values) < VARIANCE_FLOOR {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let grid = quantile_grid(&values, cfg.pdp_grid_points);
    if grid.len() < 2 {
        return None;
    }

    let stream = stream_for(attr, 11);
    let mut curve = Vec::with_capacity(grid.len());
    for v in grid {
        let pinned: Vec<PopulationMember> =
            population.iter().map(|m| m.with_numeric(attr, v)).collect();
        let rate = success_rate(
            &pinned,
            scorecard,
            modifiers,
            cfg.explain_trial_count,
            cfg.seed,
            stream,
        )
        .ok()?;
        curve.push((v, rate));
    }
    Some(curve)
}

/// Partial dependence of the success rate on one scorecard dimension.
///
/// Sweeps the dimension's score across an even grid in [0.0, 1.0] with paired
/// random streams, the population and every other dimension held fixed. Used
/// to audit the model's monotonicity (e.g. success must not rise with
/// complexity).
#[must_use]
pub fn dimension_dependence(
    population: &[PopulationMember],
    scorecard: &Scorecard,
    modifiers: &ScenarioModifiers,
    cfg: &MonteCarloConfig,
    dimension: Dimension,
    grid: &[f64],
) -> Option<Vec<(f64, f64)>> {
    let mut curve = Vec::with_capacity(grid.len());
    for &score in grid {
        if !(0.0..=1.0).contains(&score) {
            return None;
        }
        let delta = score - scorecard.score(dimension);
        let swept = scorecard.apply(&[DimensionDelta::new(dimension, delta)], "pdp_sweep");
        let rate = success_rate(
            population,
            &swept,
            modifiers,
            cfg.explain_trial_count,
            cfg.seed,
            31,
        )
        .ok()?;
        curve.push((score, rate));
    }
    Some(curve)
}
