//! Mutation and crossover operators.
//!
//! Three standalone operators (bit-flip, jump, adapter noise) plus the
//! composite [`mutate`] applied once per offspring, and uniform
//! [`crossover`]. Every operator takes an explicit `Rng`, so behavior is
//! fully determined by the caller's [`crate::rng::RngKey`].
//!
//! The adapter operators enforce a hard L2 cap on the *delta* (not the
//! vector), so per-generation drift stays bounded no matter how large the
//! noise scale is. [`mutate`] and [`crossover`] each append one audit
//! record; the standalone operators are pure.

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde_json::json;

use qube_core::AuditLog;

use crate::genome::{fresh_id, Genome, GenomeMeta};

const CAP_EPSILON: f32 = 1e-12;

/// Flip bits of `mask` independently with `flip_prob`, visiting indices in a
/// per-call shuffled order and stopping after `max_flips` flips. Candidates
/// beyond the cap are not tested. Returns a new mask.
pub fn bitflip_mutation(
    mask: &[u8],
    rng: &mut impl Rng,
    flip_prob: f64,
    max_flips: usize,
) -> Vec<u8> {
    let mut out = mask.to_vec();
    let mut indices: Vec<usize> = (0..out.len()).collect();
    indices.shuffle(rng);
    let mut flips = 0;
    for i in indices {
        if flips >= max_flips {
            break;
        }
        if rng.gen::<f64>() < flip_prob {
            out[i] = 1 - out[i];
            flips += 1;
        }
    }
    out
}

/// Unconditionally flip exactly `min(jump_bits, n)` distinct random bits.
/// Reserved for PIP mode: rare, large perturbations. Returns a new mask.
pub fn jump_mutation(mask: &[u8], rng: &mut impl Rng, jump_bits: usize) -> Vec<u8> {
    let mut out = mask.to_vec();
    let n = out.len();
    let picked = rand::seq::index::sample(rng, n, jump_bits.min(n));
    for i in picked {
        out[i] = 1 - out[i];
    }
    out
}

/// Add Gaussian noise scaled by `scale`, then rescale the delta so its L2
/// norm never exceeds `mutation_cap`. Returns a new vector.
pub fn adapter_noise_mutation(
    adapters: &[f32],
    rng: &mut impl Rng,
    scale: f32,
    mutation_cap: f32,
) -> Vec<f32> {
    let mut out: Vec<f32> = adapters
        .iter()
        .map(|&a| {
            let noise: f32 = StandardNormal.sample(rng);
            a + noise * scale
        })
        .collect();
    clamp_delta(adapters, &mut out, mutation_cap);
    out
}

/// Rescale `out - orig` in place so its L2 norm is at most `cap`.
fn clamp_delta(orig: &[f32], out: &mut [f32], cap: f32) {
    let l2: f32 = orig
        .iter()
        .zip(out.iter())
        .map(|(&a, &b)| (b - a) * (b - a))
        .sum::<f32>()
        .sqrt();
    if l2 > cap {
        let factor = cap / (l2 + CAP_EPSILON);
        for (o, &a) in out.iter_mut().zip(orig.iter()) {
            *o = a + (*o - a) * factor;
        }
    }
}

/// Mutate `genome` in place: capped adapter noise, uncapped (smaller) bias
/// noise, and per-bit mask flips. PIP genomes mutate 5-10x more
/// aggressively. Appends one `mutate` audit record.
pub fn mutate(
    genome: &mut Genome,
    rng: &mut impl Rng,
    mutation_cap: f32,
    audit: &AuditLog,
) -> Result<()> {
    let rate = genome.meta.mutation_rate;
    let pip = genome.meta.pip;
    let pip_boost = if pip { 2.0 } else { 1.0 };

    let scale = 0.05 * rate * pip_boost;
    genome.adapters = adapter_noise_mutation(&genome.adapters, rng, scale, mutation_cap);

    let bias_scale = 0.02 * rate * pip_boost;
    for b in genome.concept_bias.iter_mut() {
        let noise: f32 = StandardNormal.sample(rng);
        *b += noise * bias_scale;
    }

    let flip_prob = 0.02 * if pip { 5.0 } else { 1.0 };
    for bit in genome.hypercube_mask.iter_mut() {
        if rng.gen::<f64>() < flip_prob {
            *bit = 1 - *bit;
        }
    }

    audit.record("mutate", json!({"id": genome.id, "pip": pip}))?;
    Ok(())
}

/// Uniform crossover: per-element coin flip on adapters and bias, per-bit
/// choice on the mask; `lambda_con`/`mutation_rate` averaged; `pip`
/// inherited with probability 0.2, raised to 0.8 when either parent is PIP.
/// Returns one child with a fresh id. Appends one `crossover` record.
pub fn crossover(a: &Genome, b: &Genome, rng: &mut impl Rng, audit: &AuditLog) -> Result<Genome> {
    assert_eq!(a.adapters.len(), b.adapters.len(), "adapter dims must match");
    assert_eq!(
        a.concept_bias.len(),
        b.concept_bias.len(),
        "bias dims must match"
    );
    assert_eq!(
        a.hypercube_mask.len(),
        b.hypercube_mask.len(),
        "mask lengths must match"
    );

    let adapters = a
        .adapters
        .iter()
        .zip(b.adapters.iter())
        .map(|(&x, &y)| if rng.gen::<bool>() { x } else { y })
        .collect();
    let concept_bias = a
        .concept_bias
        .iter()
        .zip(b.concept_bias.iter())
        .map(|(&x, &y)| if rng.gen::<bool>() { x } else { y })
        .collect();
    let hypercube_mask = a
        .hypercube_mask
        .iter()
        .zip(b.hypercube_mask.iter())
        .map(|(&x, &y)| if rng.gen::<bool>() { x } else { y })
        .collect();

    let pip_chance = if a.meta.pip || b.meta.pip { 0.8 } else { 0.2 };
    let meta = GenomeMeta {
        lambda_con: (a.meta.lambda_con + b.meta.lambda_con) / 2.0,
        mutation_rate: (a.meta.mutation_rate + b.meta.mutation_rate) / 2.0,
        pip: rng.gen::<f64>() < pip_chance,
    };

    let child = Genome {
        adapters,
        concept_bias,
        hypercube_mask,
        meta,
        id: fresh_id(rng),
    };
    audit.record(
        "crossover",
        json!({"parents": [a.id, b.id], "child": child.id}),
    )?;
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngKey;

    fn test_audit() -> (tempfile::TempDir, AuditLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.jsonl")).unwrap();
        (dir, log)
    }

    fn diff_bits(a: &[u8], b: &[u8]) -> usize {
        a.iter().zip(b.iter()).filter(|(x, y)| x != y).count()
    }

    #[test]
    fn test_bitflip_respects_max_flips() {
        let mask = vec![0u8; 64];
        for seed in 0..20 {
            let mut rng = RngKey::new(seed).to_rng();
            let out = bitflip_mutation(&mask, &mut rng, 0.9, 2);
            assert!(diff_bits(&mask, &out) <= 2, "seed {}", seed);
        }
    }

    #[test]
    fn test_bitflip_deterministic_under_key() {
        let mask = vec![0u8, 1, 0, 1, 1, 0, 0, 1];
        let a = bitflip_mutation(&mask, &mut RngKey::new(5).to_rng(), 0.5, 3);
        let b = bitflip_mutation(&mask, &mut RngKey::new(5).to_rng(), 0.5, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_jump_flips_exact_count() {
        let mask = vec![0u8; 10];
        let mut rng = RngKey::new(3).to_rng();
        let out = jump_mutation(&mask, &mut rng, 3);
        assert_eq!(diff_bits(&mask, &out), 3);
        // jump_bits larger than n flips everything once
        let out = jump_mutation(&mask, &mut rng, 99);
        assert_eq!(diff_bits(&mask, &out), 10);
    }

    #[test]
    fn test_adapter_noise_honors_cap() {
        let adapters = vec![0.5f32; 32];
        for seed in 0..10 {
            let mut rng = RngKey::new(seed).to_rng();
            // scale far above the cap to force clamping
            let out = adapter_noise_mutation(&adapters, &mut rng, 10.0, 0.2);
            let l2: f32 = adapters
                .iter()
                .zip(out.iter())
                .map(|(&a, &b)| (b - a) * (b - a))
                .sum::<f32>()
                .sqrt();
            assert!(l2 <= 0.2 + 1e-6, "seed {} l2 {}", seed, l2);
        }
    }

    #[test]
    fn test_mutate_in_place_and_audited() {
        let (_dir, audit) = test_audit();
        let mut rng = RngKey::new(11).to_rng();
        let mut genome = Genome::new(
            vec![0.0; 16],
            vec![0.0; 8],
            vec![0; 12],
            GenomeMeta::default(),
            &mut rng,
        );
        let before = genome.adapters.clone();
        mutate(&mut genome, &mut rng, 0.2, &audit).unwrap();
        assert_ne!(genome.adapters, before);
        let l2: f32 = before
            .iter()
            .zip(genome.adapters.iter())
            .map(|(&a, &b)| (b - a) * (b - a))
            .sum::<f32>()
            .sqrt();
        assert!(l2 <= 0.2 + 1e-6);

        let records = audit.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["evt"], "mutate");
        assert_eq!(records[0]["id"], genome.id);
    }

    #[test]
    fn test_crossover_mixes_parents() {
        let (_dir, audit) = test_audit();
        let mut rng = RngKey::new(21).to_rng();
        let a = Genome::new(
            vec![1.0; 32],
            vec![1.0; 8],
            vec![1; 16],
            GenomeMeta {
                lambda_con: 0.2,
                mutation_rate: 0.1,
                pip: false,
            },
            &mut rng,
        );
        let b = Genome::new(
            vec![-1.0; 32],
            vec![-1.0; 8],
            vec![0; 16],
            GenomeMeta {
                lambda_con: 0.8,
                mutation_rate: 0.3,
                pip: false,
            },
            &mut rng,
        );
        let child = crossover(&a, &b, &mut rng, &audit).unwrap();

        assert!(child.adapters.iter().all(|&v| v == 1.0 || v == -1.0));
        assert!(child.adapters.iter().any(|&v| v == 1.0));
        assert!(child.adapters.iter().any(|&v| v == -1.0));
        assert!((child.meta.lambda_con - 0.5).abs() < 1e-6);
        assert!((child.meta.mutation_rate - 0.2).abs() < 1e-6);
        assert_ne!(child.id, a.id);
        assert_ne!(child.id, b.id);

        let records = audit.read_all().unwrap();
        assert_eq!(records[0]["evt"], "crossover");
        assert_eq!(records[0]["child"], child.id);
    }

    #[test]
    fn test_crossover_pip_inheritance_is_boosted() {
        let (_dir, audit) = test_audit();
        let mut rng = RngKey::new(31).to_rng();
        let mut base = |pip| {
            Genome::new(
                vec![0.0; 4],
                vec![0.0; 4],
                vec![0; 4],
                GenomeMeta {
                    pip,
                    ..GenomeMeta::default()
                },
                &mut rng,
            )
        };
        let plain_a = base(false);
        let plain_b = base(false);
        let pip_a = base(true);
        let pip_b = base(true);

        let trials = 400;
        let mut rng = RngKey::new(32).to_rng();
        let plain_hits = (0..trials)
            .filter(|_| {
                crossover(&plain_a, &plain_b, &mut rng, &audit)
                    .unwrap()
                    .meta
                    .pip
            })
            .count();
        let pip_hits = (0..trials)
            .filter(|_| crossover(&pip_a, &pip_b, &mut rng, &audit).unwrap().meta.pip)
            .count();

        // base 20% vs boosted 80%; generous margins for a 400-trial sample
        assert!(plain_hits < trials / 2, "plain hits {}", plain_hits);
        assert!(pip_hits > trials / 2, "pip hits {}", pip_hits);
    }
}
