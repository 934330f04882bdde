//! Concept grounding onto hypercube vertices.
//!
//! Each vertex carries a prototype vector; a concept is assigned to the
//! vertex whose prototype is most cosine-similar to its embedding, provided
//! the similarity clears a confidence threshold. Relational rules refine
//! the raw assignments:
//!
//! - synonyms land on Hamming-1 neighbors of their group's anchor
//! - antonyms land on the complement vertex of their counterpart
//! - hierarchies walk the cube one bit per level, hypernym to hyponym

use anyhow::Result;
use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use qube_core::{Encoder, Hypercube};

const DEFAULT_PROTOTYPE_DIM: usize = 32;
const DEFAULT_CONF_THRESHOLD: f32 = 0.75;

/// Grounds concept strings onto hypercube vertices via prototype similarity.
pub struct ConceptGrounder {
    cube: Hypercube,
    prototypes: Vec<Vec<f32>>,
    conf_threshold: f32,
    assignments: IndexMap<String, Option<u32>>,
}

impl ConceptGrounder {
    /// Seeded random prototypes, L2-normalized, one row per vertex.
    pub fn new(cube: Hypercube, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let prototypes = (0..cube.vertex_count())
            .map(|_| {
                let mut row: Vec<f32> = (0..DEFAULT_PROTOTYPE_DIM)
                    .map(|_| StandardNormal.sample(&mut rng))
                    .collect();
                normalize(&mut row);
                row
            })
            .collect();
        ConceptGrounder {
            cube,
            prototypes,
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            assignments: IndexMap::new(),
        }
    }

    /// Use caller-provided prototypes (one row per vertex).
    ///
    /// # Panics
    ///
    /// Panics if `prototypes.len() != cube.vertex_count()`.
    pub fn with_prototypes(cube: Hypercube, prototypes: Vec<Vec<f32>>) -> Self {
        assert_eq!(
            prototypes.len() as u32,
            cube.vertex_count(),
            "one prototype row per vertex"
        );
        ConceptGrounder {
            cube,
            prototypes,
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            assignments: IndexMap::new(),
        }
    }

    /// Builder: set the confidence threshold.
    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    pub fn assignments(&self) -> &IndexMap<String, Option<u32>> {
        &self.assignments
    }

    /// Vertex with the most cosine-similar prototype, plus the similarity.
    pub fn nearest_vertex(&self, vec: &[f32]) -> (u32, f32) {
        let mut best = (0u32, f32::NEG_INFINITY);
        for (vid, proto) in self.prototypes.iter().enumerate() {
            let sim = cosine(vec, proto);
            if sim > best.1 {
                best = (vid as u32, sim);
            }
        }
        best
    }

    /// Assign one concept when confidence allows; `None` below threshold.
    pub fn assign_single(&self, vec: &[f32]) -> Option<u32> {
        let (vid, score) = self.nearest_vertex(vec);
        (score >= self.conf_threshold).then_some(vid)
    }

    /// Encode and assign every concept, recording unconfident ones as unset.
    pub fn assign_bulk(&mut self, encoder: &dyn Encoder, concepts: &[String]) -> Result<()> {
        let vecs = encoder.encode(concepts)?;
        for (concept, vec) in concepts.iter().zip(vecs.iter()) {
            let assigned = self.assign_single(vec);
            self.assignments.insert(concept.clone(), assigned);
        }
        Ok(())
    }

    /// Place unassigned members of each synonym group on Hamming-1
    /// neighbors of the group's anchor, when the neighbor prototype clears
    /// the threshold. The anchor is the first already-assigned member, else
    /// the first member's nearest vertex (skipping the group if that is not
    /// confident either).
    pub fn enforce_synonyms(&mut self, encoder: &dyn Encoder, groups: &[Vec<String>]) -> Result<()> {
        for group in groups {
            if group.is_empty() {
                continue;
            }
            let vecs = encoder.encode(group)?;

            let mut anchor = group
                .iter()
                .find_map(|c| self.assignments.get(c).copied().flatten());
            if anchor.is_none() {
                let (vid, score) = self.nearest_vertex(&vecs[0]);
                if score < self.conf_threshold {
                    continue;
                }
                self.assignments.insert(group[0].clone(), Some(vid));
                anchor = Some(vid);
            }
            let anchor = anchor.expect("anchor set above");

            let neighbors = self.cube.neighbors(anchor);
            let mut next_neighbor = 0usize;
            for (concept, vec) in group.iter().zip(vecs.iter()) {
                if matches!(self.assignments.get(concept), Some(Some(_))) {
                    continue;
                }
                if next_neighbor >= neighbors.len() {
                    break;
                }
                let candidate = neighbors[next_neighbor];
                let sim = cosine(vec, &self.prototypes[candidate as usize]);
                if sim >= self.conf_threshold {
                    self.assignments.insert(concept.clone(), Some(candidate));
                    next_neighbor += 1;
                }
            }
        }
        Ok(())
    }

    /// For each antonym pair, place the second term on the complement of
    /// the first's vertex when the complement prototype clears the
    /// threshold; otherwise fall back to the second term's own nearest
    /// vertex when that is confident.
    pub fn enforce_antonyms(
        &mut self,
        encoder: &dyn Encoder,
        pairs: &[(String, String)],
    ) -> Result<()> {
        for (a, b) in pairs {
            let vecs = encoder.encode(&[a.clone(), b.clone()])?;
            let (a_vid, a_score) = self.nearest_vertex(&vecs[0]);
            if a_score < self.conf_threshold {
                continue;
            }
            let comp = self.cube.complement(a_vid);
            let comp_score = cosine(&vecs[1], &self.prototypes[comp as usize]);
            if comp_score >= self.conf_threshold {
                self.assignments.insert(a.clone(), Some(a_vid));
                self.assignments.insert(b.clone(), Some(comp));
            } else {
                let (b_vid, b_score) = self.nearest_vertex(&vecs[1]);
                if b_score >= self.conf_threshold {
                    self.assignments.insert(a.clone(), Some(a_vid));
                    self.assignments.insert(b.clone(), Some(b_vid));
                }
            }
        }
        Ok(())
    }

    /// Walk each hypernym→hyponym path onto the cube: the head anchors at
    /// its nearest confident vertex (an unconfident head skips the whole
    /// path), then every later term moves to whichever of the current
    /// vertex and its Hamming-1 neighbors is most similar. A step only
    /// advances when the best candidate clears the threshold; an
    /// unconfident term is recorded as unset and the walk stays put.
    pub fn enforce_hierarchy(&mut self, encoder: &dyn Encoder, paths: &[Vec<String>]) -> Result<()> {
        for path in paths {
            if path.is_empty() {
                continue;
            }
            let vecs = encoder.encode(path)?;
            let (start, start_score) = self.nearest_vertex(&vecs[0]);
            if start_score < self.conf_threshold {
                continue;
            }
            let mut current = start;
            self.assignments.insert(path[0].clone(), Some(current));
            for (concept, embedding) in path.iter().zip(vecs.iter()).skip(1) {
                let mut candidates = vec![current];
                candidates.extend(self.cube.neighbors(current));
                let mut best = (current, f32::NEG_INFINITY);
                for cand in candidates {
                    let sim = cosine(embedding, &self.prototypes[cand as usize]);
                    if sim > best.1 {
                        best = (cand, sim);
                    }
                }
                if best.1 >= self.conf_threshold {
                    current = best.0;
                    self.assignments.insert(concept.clone(), Some(current));
                } else {
                    self.assignments.insert(concept.clone(), None);
                }
            }
        }
        Ok(())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

fn normalize(row: &mut [f32]) {
    let norm: f32 = row.iter().map(|x| x * x).sum::<f32>().sqrt() + 1e-9;
    for x in row.iter_mut() {
        *x /= norm;
    }
}
