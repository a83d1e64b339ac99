//! Behavioral segmentation of the simulated population.
//!
//! Members are partitioned by their per-trial outcome frequency vectors with
//! a fixed-k Lloyd iteration. Initialization is deterministic (centroids
//! seeded at evenly spaced positions of the success-frequency ordering) so
//! identical runs produce identical clusters. Outliers are members whose
//! success frequency sits beyond a z-score threshold from their cluster mean.

use std::collections::BTreeSet;

use crate::monte_carlo::MemberTally;
use crate::outcome::ClusterSummary;
use crate::population::PopulationMember;

const MAX_ITERATIONS: usize = 20;

fn distance2(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// Partitions members into `k` clusters and flags outliers.
///
/// Members with no counted trials are left out of both clusters and outliers.
pub(crate) fn cluster_members(
    population: &[PopulationMember],
    tallies: &[MemberTally],
    k: usize,
    z_threshold: f64,
) -> (Vec<ClusterSummary>, BTreeSet<u64>) {
    // (member id, outcome frequency vector) for members that got trials.
    let mut points: Vec<(u64, [f64; 3])> = population
        .iter()
        .zip(tallies)
        .filter_map(|(m, t)| t.frequencies().map(|f| (m.id, f)))
        .collect();
    if points.is_empty() {
        return (Vec::new(), BTreeSet::new());
    }
    let k = k.clamp(1, points.len());

    // Deterministic init: order by success frequency, then id, and seed
    // centroids at evenly spaced ranks.
    points.sort_by(|a, b| {
        a.1[2]
            .partial_cmp(&b.1[2])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    let mut centroids: Vec<[f64; 3]> = (0..k)
        .map(|i| {
            let pos = if k == 1 {
                0
            } else {
                i * (points.len() - 1) / (k - 1)
            };
            points[pos].1
        })
        .collect();

    let mut assignment = vec![0usize; points.len()];
    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (idx, (_, freq)) in points.iter().enumerate() {
            let nearest = centroids
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    distance2(freq, a)
                        .partial_cmp(&distance2(freq, b))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map_or(0, |(i, _)| i);
            if assignment[idx] != nearest {
                assignment[idx] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (idx, (_, freq)) in points.iter().enumerate() {
            let c = assignment[idx];
            counts[c] += 1;
            for d in 0..3 {
                sums[c][d] += freq[d];
            }
        }
        for c in 0..k {
            // Empty clusters keep their previous centroid.
            if counts[c] > 0 {
                for d in 0..3 {
                    centroids[c][d] = sums[c][d] / counts[c] as f64;
                }
            }
        }

        if !changed {
            break;
        }
    }

    let mut clusters = Vec::new();
    let mut outliers = BTreeSet::new();
    for c in 0..k {
        let members: Vec<(u64, [f64; 3])> = points
            .iter()
            .enumerate()
            .filter(|(idx, _)| assignment[*idx] == c)
            .map(|(_, p)| *p)
            .collect();
        if members.is_empty() {
            continue;
        }

        let successes: Vec<f64> = members.iter().map(|(_, f)| f[2]).collect();
        let mean = successes.iter().sum::<f64>() / successes.len() as f64;
        let var =
            successes.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / successes.len() as f64;
        let std = var.sqrt();

        if std > 0.0 {
            for (id, freq) in &members {
                if ((freq[2] - mean) / std).abs() > z_threshold {
                    outliers.insert(*id);
                }
            }
        }

        let mut member_ids: Vec<u64> = members.iter().map(|(id, _)| *id).collect();
        member_ids.sort_unstable();
        clusters.push(ClusterSummary {
            index: clusters.len(),
            member_ids,
            centroid: centroids[c],
            mean_success_rate: mean,
        });
    }

    (clusters, outliers)
}
