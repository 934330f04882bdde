//! Capability interfaces for external collaborators.
//!
//! The core treats the text generator, the embedding encoder, the vector
//! database, and the safety/review predicates as opaque collaborators. Each
//! is a named trait injected at construction, never looked up ambiently,
//! so tests can substitute deterministic fakes and the core never grows a
//! dependency on any particular model runtime.
//!
//! Blanket implementations are provided for plain closures with the matching
//! signature, which keeps test wiring as light as the duck-typed callables
//! these interfaces replace.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Borrowed view of a genome, as much as a generator needs to condition on.
///
/// Defined here (rather than next to the genome itself) so collaborator
/// traits stay independent of the evolutionary crate.
#[derive(Debug, Clone, Copy)]
pub struct GenomeView<'a> {
    /// Adapter vector steering generation.
    pub adapters: &'a [f32],
    /// Concept-selection bias vector.
    pub concept_bias: &'a [f32],
    /// Hypercube routing mask (0/1 per bit).
    pub hypercube_mask: &'a [u8],
    /// Creative/exploratory mode flag.
    pub pip: bool,
    /// Opaque genome identity token.
    pub id: &'a str,
}

/// Text generator: must be a pure function of its three inputs so tests
/// are reproducible (no hidden state).
pub trait Generator {
    fn generate(&self, genome: &GenomeView<'_>, prompt: &str, temperature: f32) -> Result<String>;
}

impl<F> Generator for F
where
    F: Fn(&GenomeView<'_>, &str, f32) -> Result<String>,
{
    fn generate(&self, genome: &GenomeView<'_>, prompt: &str, temperature: f32) -> Result<String> {
        self(genome, prompt, temperature)
    }
}

/// Embedding encoder: one fixed-dimension vector per input text.
pub trait Encoder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

impl<F> Encoder for F
where
    F: Fn(&[String]) -> Result<Vec<Vec<f32>>>,
{
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self(texts)
    }
}

/// One provenance hit returned by the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceHit {
    /// Hypercube vertex the hit is grounded on.
    pub vertex_id: u32,
    /// Similarity score (higher is closer).
    pub score: f32,
    /// Opaque metadata carried through untouched.
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// Vector database used for provenance retrieval. Results are ordered by
/// descending score.
pub trait VectorIndex {
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ProvenanceHit>>;
}

impl<F> VectorIndex for F
where
    F: Fn(&[f32], usize) -> Result<Vec<ProvenanceHit>>,
{
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ProvenanceHit>> {
        self(vector, top_k)
    }
}

/// Verdict of a safety check. A rejection is a normal result variant, not
/// an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub safe: bool,
    pub reason: String,
}

impl SafetyVerdict {
    pub fn ok() -> Self {
        SafetyVerdict {
            safe: true,
            reason: "ok".to_string(),
        }
    }

    pub fn unsafe_because(reason: impl Into<String>) -> Self {
        SafetyVerdict {
            safe: false,
            reason: reason.into(),
        }
    }
}

/// Boundary predicate consulted before accepting generated output.
pub trait SafetyGate {
    fn check(&self, text: &str) -> SafetyVerdict;
}

impl<F> SafetyGate for F
where
    F: Fn(&str) -> SafetyVerdict,
{
    fn check(&self, text: &str) -> SafetyVerdict {
        self(text)
    }
}

/// Optional human gate for PIP-mode output that failed the safety check.
pub trait ReviewGate {
    fn approve(&self, text: &str, context: &serde_json::Value) -> bool;
}

impl<F> ReviewGate for F
where
    F: Fn(&str, &serde_json::Value) -> bool,
{
    fn approve(&self, text: &str, context: &serde_json::Value) -> bool {
        self(text, context)
    }
}
