//! # qube-infer
//!
//! Inference layer of the QUBE concept-routing harness.
//!
//! - [`InferenceManager`]: the generate pipeline: mode parameters,
//!   provenance retrieval, confidence estimation, safety gating, and the
//!   PIP human-review path. Collaborator failures degrade (empty
//!   provenance, neutral confidence); unsafe output is a flagged result,
//!   never an error.
//! - [`DialogueState`]: bounded per-user vertex paths and token context.
//! - [`BasicSafetyGate`]: blacklist/repetition heuristics behind the
//!   [`qube_core::SafetyGate`] trait, plus the fixed fallback response.

pub mod dialogue;
pub mod inference;
pub mod safety;

pub use dialogue::DialogueState;
pub use inference::{InferenceManager, InferenceOutcome, Mode, ModeParams};
pub use safety::{fallback_safe_response, BasicSafetyGate, DEFAULT_BLACKLIST};
