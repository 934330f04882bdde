//! The evolvable unit: adapter vector, concept bias, hypercube mask, and
//! metadata.
//!
//! Genomes are value-like. Mutation operators change them in place (an
//! explicit part of their contract, see [`crate::mutation`]); crossover
//! produces a new genome owned by the caller. `Clone` preserves the id:
//! copies of a genome share its lineage token, and a fresh identity is an
//! explicit request via [`Genome::with_new_id`].

use rand::Rng;
use serde::{Deserialize, Serialize};

use qube_core::GenomeView;

/// Tunable per-genome metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeMeta {
    /// Concept-consistency weight used by downstream loss mixing.
    pub lambda_con: f32,
    /// Base mutation rate scaling the adapter/bias noise.
    pub mutation_rate: f32,
    /// Creative/exploratory mode: larger mutations, mandatory safety review.
    pub pip: bool,
}

impl Default for GenomeMeta {
    fn default() -> Self {
        GenomeMeta {
            lambda_con: 0.5,
            mutation_rate: 0.1,
            pip: false,
        }
    }
}

/// One population member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    /// Adapter vector steering the external generator.
    pub adapters: Vec<f32>,
    /// Concept-selection bias vector.
    pub concept_bias: Vec<f32>,
    /// Hypercube routing preferences, one 0/1 entry per cube dimension.
    pub hypercube_mask: Vec<u8>,
    pub meta: GenomeMeta,
    /// Opaque unique token; preserved across clones for lineage tracking.
    pub id: String,
}

impl Genome {
    /// Create a genome with an id drawn from `rng`.
    pub fn new(
        adapters: Vec<f32>,
        concept_bias: Vec<f32>,
        hypercube_mask: Vec<u8>,
        meta: GenomeMeta,
        rng: &mut impl Rng,
    ) -> Self {
        Genome {
            adapters,
            concept_bias,
            hypercube_mask,
            meta,
            id: fresh_id(rng),
        }
    }

    /// Copy with a newly drawn identity (breaks the lineage link).
    pub fn with_new_id(&self, rng: &mut impl Rng) -> Self {
        let mut copy = self.clone();
        copy.id = fresh_id(rng);
        copy
    }

    /// Borrowed view handed to the external generator.
    pub fn view(&self) -> GenomeView<'_> {
        GenomeView {
            adapters: &self.adapters,
            concept_bias: &self.concept_bias,
            hypercube_mask: &self.hypercube_mask,
            pip: self.meta.pip,
            id: &self.id,
        }
    }

    /// First six characters of the id, for compact log lines.
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(6)]
    }
}

/// Draw a 32-hex-char identity token.
pub(crate) fn fresh_id(rng: &mut impl Rng) -> String {
    format!("{:032x}", rng.gen::<u128>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngKey;

    fn sample_genome() -> Genome {
        let mut rng = RngKey::new(1).to_rng();
        Genome::new(
            vec![0.1, -0.2, 0.3],
            vec![0.0, 0.0],
            vec![1, 0, 1, 1],
            GenomeMeta::default(),
            &mut rng,
        )
    }

    #[test]
    fn test_clone_preserves_id() {
        let g = sample_genome();
        let copy = g.clone();
        assert_eq!(copy.id, g.id);
        assert_eq!(copy.adapters, g.adapters);
    }

    #[test]
    fn test_with_new_id_breaks_lineage() {
        let g = sample_genome();
        let mut rng = RngKey::new(2).to_rng();
        let fresh = g.with_new_id(&mut rng);
        assert_ne!(fresh.id, g.id);
        assert_eq!(fresh.adapters, g.adapters);
    }

    #[test]
    fn test_view_borrows_fields() {
        let g = sample_genome();
        let view = g.view();
        assert_eq!(view.adapters, g.adapters.as_slice());
        assert_eq!(view.hypercube_mask, &[1, 0, 1, 1]);
        assert!(!view.pip);
        assert_eq!(view.id, g.id);
    }

    #[test]
    fn test_id_is_32_hex_chars() {
        let g = sample_genome();
        assert_eq!(g.id.len(), 32);
        assert!(g.id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
