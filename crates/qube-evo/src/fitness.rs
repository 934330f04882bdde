//! Scalar fitness, hard constraints, and Pareto selection.
//!
//! Fitness weighting here is a different scheme from the evaluator's axis
//! weights: it adds a **negative** toxicity weight (a penalty axis the
//! evaluator never produces on its own). Hard constraints gate selection
//! entirely: a genome below any floor cannot become a parent regardless of
//! its scalar fitness.

use std::collections::BTreeMap;

use rand::Rng;

use crate::genome::Genome;

/// Named weights for scalar fitness. Missing scores contribute 0.
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessWeights(pub BTreeMap<String, f32>);

impl Default for FitnessWeights {
    /// The five positive axes plus toxicity as a penalty.
    fn default() -> Self {
        FitnessWeights(BTreeMap::from([
            ("coherence".to_string(), 0.35),
            ("factuality".to_string(), 0.35),
            ("novelty".to_string(), 0.15),
            ("analogy".to_string(), 0.10),
            ("alignment".to_string(), 0.05),
            ("toxicity".to_string(), -0.5),
        ]))
    }
}

/// Weighted sum of `scores` under `weights`.
pub fn compute_fitness(scores: &BTreeMap<String, f32>, weights: &FitnessWeights) -> f32 {
    weights
        .0
        .iter()
        .map(|(k, &w)| w * scores.get(k).copied().unwrap_or(0.0))
        .sum()
}

/// Default selection floors: coherence must reach 0.7.
pub fn default_floors() -> BTreeMap<String, f32> {
    BTreeMap::from([("coherence".to_string(), 0.7)])
}

/// Check hard floors. Returns `(pass, failed_axis_names)`; a missing score
/// counts as 0 and fails any positive floor.
pub fn check_hard_constraints(
    scores: &BTreeMap<String, f32>,
    floors: &BTreeMap<String, f32>,
) -> (bool, Vec<String>) {
    let failed: Vec<String> = floors
        .iter()
        .filter(|(k, &floor)| scores.get(*k).copied().unwrap_or(0.0) < floor)
        .map(|(k, _)| k.clone())
        .collect();
    (failed.is_empty(), failed)
}

/// Indices of the non-dominated items under the named objectives (all
/// maximized). Item i is dominated by j iff j is >= on every objective and
/// strictly greater on at least one; items equal on all objectives survive
/// together. O(n^2), fine for research-scale populations.
pub fn pareto_front_indices(
    metrics: &[BTreeMap<String, f32>],
    objectives: &[&str],
) -> Vec<usize> {
    let n = metrics.len();
    let value = |i: usize, key: &str| metrics[i].get(key).copied().unwrap_or(0.0);
    let mut dominated = vec![false; n];
    for i in 0..n {
        if dominated[i] {
            continue;
        }
        for j in 0..n {
            if i == j {
                continue;
            }
            let mut better_or_equal = true;
            let mut strictly_better = false;
            for &key in objectives {
                let vi = value(i, key);
                let vj = value(j, key);
                if vj < vi {
                    better_or_equal = false;
                    break;
                }
                if vj > vi {
                    strictly_better = true;
                }
            }
            if better_or_equal && strictly_better {
                dominated[i] = true;
                break;
            }
        }
    }
    (0..n).filter(|&i| !dominated[i]).collect()
}

/// Pareto front over `(item, metrics)` pairs; returns the surviving items.
pub fn pareto_front<'a, T>(
    items: &'a [(T, BTreeMap<String, f32>)],
    objectives: &[&str],
) -> Vec<&'a T> {
    let metrics: Vec<BTreeMap<String, f32>> =
        items.iter().map(|(_, m)| m.clone()).collect();
    pareto_front_indices(&metrics, objectives)
        .into_iter()
        .map(|i| &items[i].0)
        .collect()
}

/// Tournament selection: sample `min(k, len)` distinct members uniformly
/// without replacement, return a clone of the one with highest scalar
/// fitness. Ties go to the first seen in sampled order.
///
/// # Panics
///
/// Panics if `pop` is empty.
pub fn tournament_select(pop: &[(Genome, f32)], k: usize, rng: &mut impl Rng) -> Genome {
    assert!(!pop.is_empty(), "cannot select from an empty population");
    let picked = rand::seq::index::sample(rng, pop.len(), k.min(pop.len()));
    let mut best: Option<(&Genome, f32)> = None;
    for i in picked {
        let (g, score) = &pop[i];
        match best {
            Some((_, best_score)) if *score <= best_score => {}
            _ => best = Some((g, *score)),
        }
    }
    best.expect("tournament sampled at least one member").0.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeMeta;
    use crate::rng::RngKey;

    fn map(pairs: &[(&str, f32)]) -> BTreeMap<String, f32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_fitness_weighted_sum_with_penalty() {
        let weights = FitnessWeights::default();
        let clean = map(&[("coherence", 0.8), ("factuality", 0.8)]);
        let toxic = map(&[("coherence", 0.8), ("factuality", 0.8), ("toxicity", 0.5)]);
        let f_clean = compute_fitness(&clean, &weights);
        let f_toxic = compute_fitness(&toxic, &weights);
        assert!((f_clean - 0.56).abs() < 1e-6);
        assert!((f_clean - f_toxic - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_hard_constraints_report_failed_axes() {
        let floors = map(&[("coherence", 0.7)]);
        let (ok, failed) = check_hard_constraints(&map(&[("coherence", 0.5)]), &floors);
        assert!(!ok);
        assert_eq!(failed, vec!["coherence".to_string()]);

        let (ok, failed) = check_hard_constraints(&map(&[("coherence", 0.75)]), &floors);
        assert!(ok);
        assert!(failed.is_empty());
    }

    #[test]
    fn test_missing_score_fails_floor() {
        let floors = map(&[("factuality", 0.6)]);
        let (ok, failed) = check_hard_constraints(&map(&[("coherence", 0.9)]), &floors);
        assert!(!ok);
        assert_eq!(failed, vec!["factuality".to_string()]);
    }

    #[test]
    fn test_pareto_front_excludes_dominated() {
        let items = vec![
            ("A", map(&[("x", 1.0), ("y", 0.0)])),
            ("B", map(&[("x", 0.0), ("y", 1.0)])),
            ("C", map(&[("x", 0.0), ("y", 0.0)])),
        ];
        let front = pareto_front(&items, &["x", "y"]);
        let names: Vec<&str> = front.into_iter().copied().collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_pareto_ties_survive_together() {
        let items = vec![
            ("A", map(&[("x", 0.5), ("y", 0.5)])),
            ("B", map(&[("x", 0.5), ("y", 0.5)])),
        ];
        let front = pareto_front(&items, &["x", "y"]);
        assert_eq!(front.len(), 2);
    }

    #[test]
    fn test_pareto_single_objective() {
        let items = vec![
            (0usize, map(&[("x", 0.1)])),
            (1, map(&[("x", 0.9)])),
            (2, map(&[("x", 0.5)])),
        ];
        let front = pareto_front(&items, &["x"]);
        assert_eq!(front, vec![&1]);
    }

    #[test]
    fn test_tournament_returns_best_of_sample() {
        let mut rng = RngKey::new(17).to_rng();
        let pop: Vec<(Genome, f32)> = (0..6)
            .map(|i| {
                let g = Genome::new(
                    vec![i as f32],
                    vec![0.0],
                    vec![0, 1],
                    GenomeMeta::default(),
                    &mut rng,
                );
                (g, i as f32 * 0.1)
            })
            .collect();

        // k covering the whole population always returns the global best
        let winner = tournament_select(&pop, 6, &mut rng);
        assert_eq!(winner.id, pop[5].0.id);
        // and the winner is a copy, not a move
        assert_eq!(pop.len(), 6);
    }
}
