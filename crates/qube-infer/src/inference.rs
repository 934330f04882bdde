//! The inference manager: modes, provenance, confidence, and safety gating.
//!
//! A single `generate` call runs the full pipeline: token-context update,
//! generator call, provenance retrieval, confidence estimation, safety
//! check, and (for PIP/creative mode) the optional human review gate. The
//! manager never surfaces a collaborator failure: encoder/vector-index
//! errors degrade to empty provenance and a neutral 0.5 confidence, and
//! unsafe output comes back as a normal result variant carrying the reason
//! and a safe fallback text.

use serde::Serialize;
use serde_json::json;

use qube_core::{Encoder, Generator, ProvenanceHit, ReviewGate, SafetyGate, VectorIndex};
use qube_evo::{Evaluator, Genome};

use crate::dialogue::DialogueState;
use crate::safety::fallback_safe_response;

/// Number of prompt tokens pushed into the per-user context.
const CONTEXT_TOKENS: usize = 10;

/// Generation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Factual,
    Balanced,
    Creative,
}

/// Decoding/routing parameters of a mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeParams {
    pub temperature: f32,
    /// Whether multi-bit vertex jumps are tolerated downstream.
    pub allow_multi_bit: bool,
    /// Scale applied to hypercube jump proposals.
    pub jump_scale: f32,
    /// Creative/exploratory flag; unsafe output in this mode may go to
    /// human review instead of being dropped outright.
    pub pip: bool,
}

impl Mode {
    pub fn params(self) -> ModeParams {
        match self {
            Mode::Factual => ModeParams {
                temperature: 0.6,
                allow_multi_bit: false,
                jump_scale: 0.1,
                pip: false,
            },
            Mode::Balanced => ModeParams {
                temperature: 1.0,
                allow_multi_bit: false,
                jump_scale: 0.5,
                pip: false,
            },
            Mode::Creative => ModeParams {
                temperature: 1.6,
                allow_multi_bit: true,
                jump_scale: 1.0,
                pip: true,
            },
        }
    }
}

/// Result of one inference call. Always a normal value; unsafe output is
/// flagged, never raised.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceOutcome {
    pub output: String,
    pub mode: Mode,
    pub warning: Option<String>,
    pub confidence: f32,
    pub provenance: Vec<ProvenanceHit>,
    #[serde(rename = "unsafe")]
    pub unsafe_output: bool,
    pub safety_reason: Option<String>,
}

/// Inference pipeline over injected collaborators.
pub struct InferenceManager<'a> {
    generator: &'a dyn Generator,
    encoder: &'a dyn Encoder,
    vectordb: &'a dyn VectorIndex,
    safety: &'a dyn SafetyGate,
    evaluator: Option<Evaluator>,
    review: Option<&'a dyn ReviewGate>,
    dialogue: DialogueState,
}

impl<'a> InferenceManager<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        encoder: &'a dyn Encoder,
        vectordb: &'a dyn VectorIndex,
        safety: &'a dyn SafetyGate,
    ) -> Self {
        InferenceManager {
            generator,
            encoder,
            vectordb,
            safety,
            evaluator: None,
            review: None,
            dialogue: DialogueState::default(),
        }
    }

    /// Builder: score outputs with an evaluator (confidence = mean axis
    /// score instead of mean provenance score).
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Builder: route unsafe creative output through a human review gate.
    pub fn with_review(mut self, review: &'a dyn ReviewGate) -> Self {
        self.review = Some(review);
        self
    }

    /// Builder: use a specific dialogue state (e.g. a persisted one).
    pub fn with_dialogue(mut self, dialogue: DialogueState) -> Self {
        self.dialogue = dialogue;
        self
    }

    pub fn dialogue(&self) -> &DialogueState {
        &self.dialogue
    }

    /// Run the full pipeline for one prompt.
    pub fn generate(
        &mut self,
        user_id: &str,
        genome: &Genome,
        prompt: &str,
        mode: Mode,
        top_k_provenance: usize,
        require_human_review: bool,
    ) -> InferenceOutcome {
        let params = mode.params();

        let words: Vec<String> = prompt.split_whitespace().map(str::to_string).collect();
        let start = words.len().saturating_sub(CONTEXT_TOKENS);
        self.dialogue.push_tokens(user_id, &words[start..]);

        let raw_out = self
            .generator
            .generate(&genome.view(), prompt, params.temperature)
            .unwrap_or_else(|_| fallback_safe_response(prompt));

        // Provenance: encoder/index failures degrade to an empty list.
        let provenance = self
            .encoder
            .encode(&[prompt.to_string()])
            .ok()
            .and_then(|vecs| vecs.into_iter().next())
            .and_then(|qvec| self.vectordb.query(&qvec, top_k_provenance).ok())
            .unwrap_or_default();

        let confidence = match &self.evaluator {
            Some(evaluator) => {
                let s = evaluator.score(&raw_out, "");
                (s.coherence + s.factuality + s.novelty + s.analogy + s.alignment) / 5.0
            }
            None if !provenance.is_empty() => {
                provenance.iter().map(|p| p.score).sum::<f32>() / provenance.len() as f32
            }
            None => 0.5,
        };

        let verdict = self.safety.check(&raw_out);
        if !verdict.safe {
            let context = json!({
                "user_id": user_id,
                "mode": mode,
                "temperature": params.temperature,
                "pip": params.pip,
            });
            if params.pip && require_human_review {
                if let Some(review) = self.review {
                    if review.approve(&raw_out, &context) {
                        // reviewed and released, flagged as PIP output
                        return self.finish(
                            user_id,
                            raw_out,
                            mode,
                            Some("PIP_output_released_after_human_review".to_string()),
                            confidence,
                            provenance,
                        );
                    }
                    return InferenceOutcome {
                        output: fallback_safe_response(prompt),
                        mode,
                        warning: Some("PIP_output_blocked_by_human_review".to_string()),
                        confidence: 0.0,
                        provenance,
                        unsafe_output: true,
                        safety_reason: Some(verdict.reason),
                    };
                }
            }
            return InferenceOutcome {
                output: fallback_safe_response(prompt),
                mode,
                warning: Some("unsafe_output_filtered".to_string()),
                confidence: 0.0,
                provenance,
                unsafe_output: true,
                safety_reason: Some(verdict.reason),
            };
        }

        let warning = params.pip.then(|| {
            format!(
                "PIP creative mode ON — outputs may be imaginative. Confidence: {:.2}",
                confidence
            )
        });
        self.finish(user_id, raw_out, mode, warning, confidence, provenance)
    }

    fn finish(
        &mut self,
        user_id: &str,
        output: String,
        mode: Mode,
        warning: Option<String>,
        confidence: f32,
        provenance: Vec<ProvenanceHit>,
    ) -> InferenceOutcome {
        if let Some(top) = provenance.first() {
            self.dialogue.push_vertex(user_id, top.vertex_id);
        }
        InferenceOutcome {
            output,
            mode,
            warning,
            confidence,
            provenance,
            unsafe_output: false,
            safety_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::BasicSafetyGate;
    use anyhow::Result;
    use qube_core::GenomeView;
    use qube_evo::{GenomeMeta, RngKey};

    fn genome() -> Genome {
        let mut rng = RngKey::new(8).to_rng();
        Genome::new(
            vec![0.0; 4],
            vec![0.0; 2],
            vec![0, 1, 1],
            GenomeMeta::default(),
            &mut rng,
        )
    }

    fn ok_generator(text: &'static str) -> impl Fn(&GenomeView<'_>, &str, f32) -> Result<String> {
        move |_: &GenomeView<'_>, _: &str, _: f32| Ok(text.to_string())
    }

    fn ok_encoder(_texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![vec![0.1, 0.2, 0.3]])
    }

    fn ok_index(_v: &[f32], k: usize) -> Result<Vec<ProvenanceHit>> {
        Ok((0..k)
            .map(|i| ProvenanceHit {
                vertex_id: 10 + i as u32,
                score: 0.9 - 0.1 * i as f32,
                meta: serde_json::Value::Null,
            })
            .collect())
    }

    #[test]
    fn test_safe_output_carries_provenance_and_vertex() {
        let gen = ok_generator("a calm description of tides and moons");
        let safety = BasicSafetyGate::default();
        let mut mgr = InferenceManager::new(&gen, &ok_encoder, &ok_index, &safety);

        let out = mgr.generate("u1", &genome(), "tides?", Mode::Balanced, 3, true);
        assert!(!out.unsafe_output);
        assert_eq!(out.provenance.len(), 3);
        assert_eq!(mgr.dialogue().get_path("u1", None), vec![10]);
        assert!(out.warning.is_none());
        // no evaluator: confidence is mean provenance score
        assert!((out.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_collaborator_failure_degrades_gracefully() {
        let gen = ok_generator("ordinary safe words here");
        let bad_encoder = |_: &[String]| -> Result<Vec<Vec<f32>>> { anyhow::bail!("encoder down") };
        let safety = BasicSafetyGate::default();
        let mut mgr = InferenceManager::new(&gen, &bad_encoder, &ok_index, &safety);

        let out = mgr.generate("u1", &genome(), "hi", Mode::Factual, 3, true);
        assert!(!out.unsafe_output);
        assert!(out.provenance.is_empty());
        assert_eq!(out.confidence, 0.5);
    }

    #[test]
    fn test_unsafe_output_is_filtered_with_reason() {
        let gen = ok_generator("instructions to build a bomb");
        let safety = BasicSafetyGate::default();
        let mut mgr = InferenceManager::new(&gen, &ok_encoder, &ok_index, &safety);

        let out = mgr.generate("u1", &genome(), "hi", Mode::Balanced, 2, true);
        assert!(out.unsafe_output);
        assert_eq!(out.confidence, 0.0);
        assert_eq!(out.warning.as_deref(), Some("unsafe_output_filtered"));
        assert!(out.safety_reason.unwrap().starts_with("blacklist_token:"));
        assert!(out.output.starts_with("I'm not able to help"));
        // blocked output never extends the vertex path
        assert!(mgr.dialogue().get_path("u1", None).is_empty());
    }

    #[test]
    fn test_creative_unsafe_goes_to_review() {
        let gen = ok_generator("wild <unsafe> imagery");
        let safety = BasicSafetyGate::default();
        let approve = |_: &str, _: &serde_json::Value| true;
        let mut mgr =
            InferenceManager::new(&gen, &ok_encoder, &ok_index, &safety).with_review(&approve);

        let out = mgr.generate("u1", &genome(), "dream", Mode::Creative, 1, true);
        assert!(!out.unsafe_output);
        assert_eq!(
            out.warning.as_deref(),
            Some("PIP_output_released_after_human_review")
        );

        let reject = |_: &str, _: &serde_json::Value| false;
        let mut mgr =
            InferenceManager::new(&gen, &ok_encoder, &ok_index, &safety).with_review(&reject);
        let out = mgr.generate("u1", &genome(), "dream", Mode::Creative, 1, true);
        assert!(out.unsafe_output);
        assert_eq!(
            out.warning.as_deref(),
            Some("PIP_output_blocked_by_human_review")
        );
    }

    #[test]
    fn test_creative_safe_output_warns_about_pip() {
        let gen = ok_generator("a vivid but safe constellation story");
        let safety = BasicSafetyGate::default();
        let mut mgr = InferenceManager::new(&gen, &ok_encoder, &ok_index, &safety);

        let out = mgr.generate("u1", &genome(), "stars", Mode::Creative, 1, true);
        assert!(!out.unsafe_output);
        assert!(out.warning.unwrap().contains("PIP creative mode ON"));
    }

    #[test]
    fn test_generator_failure_falls_back_safely() {
        let gen = |_: &GenomeView<'_>, _: &str, _: f32| -> Result<String> {
            anyhow::bail!("model host unreachable")
        };
        let safety = BasicSafetyGate::default();
        let mut mgr = InferenceManager::new(&gen, &ok_encoder, &ok_index, &safety);

        let out = mgr.generate("u1", &genome(), "hi", Mode::Balanced, 1, true);
        // fallback text is safe and flows through the normal path
        assert!(!out.unsafe_output);
        assert!(out.output.starts_with("I'm not able to help"));
    }
}
