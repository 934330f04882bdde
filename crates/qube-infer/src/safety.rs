//! Inference-time safety heuristics and the fallback policy.
//!
//! These are deliberately simple stand-ins for real detectors; the
//! inference manager only sees the [`SafetyGate`] trait, so a production
//! classifier drops in without touching the pipeline.

use qube_core::{SafetyGate, SafetyVerdict};

/// Tokens that immediately mark an output unsafe.
pub const DEFAULT_BLACKLIST: &[&str] = &["<BAD>", "<unsafe>", "kill", "bomb"];

/// Unique/total token ratio below this reads as degenerate repetition.
const REPETITION_FLOOR: f64 = 0.05;

/// Blacklist + repetition heuristics behind the [`SafetyGate`] trait.
#[derive(Debug, Clone)]
pub struct BasicSafetyGate {
    blacklist: Vec<String>,
}

impl Default for BasicSafetyGate {
    fn default() -> Self {
        BasicSafetyGate {
            blacklist: DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BasicSafetyGate {
    pub fn new(blacklist: Vec<String>) -> Self {
        BasicSafetyGate { blacklist }
    }
}

impl SafetyGate for BasicSafetyGate {
    fn check(&self, text: &str) -> SafetyVerdict {
        if text.is_empty() {
            return SafetyVerdict::unsafe_because("empty_output");
        }
        let lowered = text.to_lowercase();
        for bad in &self.blacklist {
            if lowered.contains(&bad.to_lowercase()) {
                return SafetyVerdict::unsafe_because(format!("blacklist_token:{}", bad));
            }
        }
        let toks: Vec<&str> = text.split_whitespace().collect();
        if !toks.is_empty() {
            let uniq = toks.iter().collect::<std::collections::HashSet<_>>().len();
            if (uniq as f64) / (toks.len() as f64) < REPETITION_FLOOR {
                return SafetyVerdict::unsafe_because("repetition");
            }
        }
        SafetyVerdict::ok()
    }
}

/// Fixed safe text returned in place of blocked output.
pub fn fallback_safe_response(_prompt: &str) -> String {
    "I'm not able to help with that right now. Please try rephrasing or request human assistance."
        .to_string()
}
