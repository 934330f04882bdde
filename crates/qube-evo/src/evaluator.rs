//! Multi-axis scoring of generated text.
//!
//! Maps an output (plus optional reference) to five scores in [0, 1]:
//!
//! - **coherence**: lexical diversity scaled by a length term capped at 50
//!   tokens
//! - **factuality**: token-overlap ratio against the reference when one is
//!   given, else a neutral 0.5
//! - **novelty**: length normalized to 50 tokens
//! - **analogy**: deterministic hash-based pseudo-randomness (placeholder)
//! - **alignment**: zeroed by the reserved `<BAD>` token (placeholder)
//!
//! These are intentionally lightweight, pluggable heuristics; the selection
//! machinery in [`crate::fitness`] only sees the named score map.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Token that zeroes the alignment axis when present in an output.
pub const BAD_TOKEN: &str = "<BAD>";

const LENGTH_NORM_TOKENS: f32 = 50.0;

/// Scores along the five evaluation axes, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisScores {
    pub coherence: f32,
    pub factuality: f32,
    pub novelty: f32,
    pub analogy: f32,
    pub alignment: f32,
}

impl AxisScores {
    /// Name → value map for the constraint and Pareto machinery.
    pub fn as_map(&self) -> BTreeMap<String, f32> {
        BTreeMap::from([
            ("coherence".to_string(), self.coherence),
            ("factuality".to_string(), self.factuality),
            ("novelty".to_string(), self.novelty),
            ("analogy".to_string(), self.analogy),
            ("alignment".to_string(), self.alignment),
        ])
    }

    /// Compact one-line form for log output.
    pub fn summary(&self) -> String {
        format!(
            "coh={:.3} fact={:.3} nov={:.3} ana={:.3} align={:.3}",
            self.coherence, self.factuality, self.novelty, self.analogy, self.alignment
        )
    }
}

impl std::fmt::Display for AxisScores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())
    }
}

/// Weights over the five positive axes. Defaults sum to 1. Distinct from
/// [`crate::fitness::FitnessWeights`], which adds a negative toxicity axis;
/// the two schemes must not be confused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisWeights {
    pub coherence: f32,
    pub factuality: f32,
    pub novelty: f32,
    pub analogy: f32,
    pub alignment: f32,
}

impl Default for AxisWeights {
    fn default() -> Self {
        AxisWeights {
            coherence: 0.35,
            factuality: 0.35,
            novelty: 0.15,
            analogy: 0.10,
            alignment: 0.05,
        }
    }
}

/// Lightweight heuristic evaluator.
#[derive(Debug, Clone, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Evaluator
    }

    /// Score an output against an optional reference (empty string = none).
    pub fn score(&self, output: &str, reference: &str) -> AxisScores {
        let toks: Vec<&str> = output.split_whitespace().collect();
        let len = toks.len();
        let uniq = toks.iter().collect::<HashSet<_>>().len();

        let coherence = norm(
            (uniq as f32 / len.max(1) as f32)
                * (len.min(LENGTH_NORM_TOKENS as usize) as f32 / LENGTH_NORM_TOKENS),
        );

        let factuality = if reference.is_empty() {
            0.5
        } else {
            let ref_toks: HashSet<&str> = reference.split_whitespace().collect();
            let out_toks: HashSet<&str> = toks.iter().copied().collect();
            let overlap = ref_toks.intersection(&out_toks).count();
            norm(overlap as f32 / ref_toks.len().max(1) as f32)
        };

        let novelty = norm((len as f32 / LENGTH_NORM_TOKENS).min(1.0));
        let analogy = norm((fnv1a64(output.as_bytes()) % 100) as f32 / 100.0);
        let alignment = if output.contains(BAD_TOKEN) { 0.0 } else { 0.9 };

        AxisScores {
            coherence,
            factuality,
            novelty,
            analogy,
            alignment,
        }
    }

    /// Weighted scalar over the five axes.
    pub fn aggregate(&self, scores: &AxisScores, weights: &AxisWeights) -> f32 {
        scores.coherence * weights.coherence
            + scores.factuality * weights.factuality
            + scores.novelty * weights.novelty
            + scores.analogy * weights.analogy
            + scores.alignment * weights.alignment
    }
}

/// Clamp to [0, 1]; NaN/inf collapse to 0.
fn norm(x: f32) -> f32 {
    if !x.is_finite() {
        return 0.0;
    }
    x.clamp(0.0, 1.0)
}

/// FNV-1a: a stable stand-in for interpreter string hashing, so the analogy
/// placeholder is deterministic across runs and platforms.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
