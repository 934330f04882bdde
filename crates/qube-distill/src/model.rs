//! Teacher/student model interfaces.
//!
//! Both models are opaque collaborators. The teacher is read-only (the
//! no-grad contract is the immutable receiver); the student additionally
//! accumulates updates via [`StudentModel::step`] and owns its serialized
//! state as an opaque blob identified by path.

use std::path::Path;

use anyhow::Result;

/// One training batch. `labels` enables the cross-entropy term; positions
/// labelled [`crate::losses::IGNORE_LABEL`] are skipped.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub input_ids: Vec<Vec<u32>>,
    pub labels: Option<Vec<i64>>,
}

/// What a forward pass produces. Empty vectors mean "not produced": each
/// loss term only applies when both sides produce its inputs.
#[derive(Debug, Clone, Default)]
pub struct ModelOutput {
    /// Per-position vocabulary logits.
    pub logits: Vec<Vec<f32>>,
    /// Concept vector for the batch.
    pub concepts: Vec<f32>,
    /// Predicted hypercube vertex id sequences.
    pub vertex_preds: Vec<Vec<u32>>,
}

/// The frozen teacher.
pub trait TeacherModel {
    fn forward(&self, batch: &Batch) -> Result<ModelOutput>;
}

/// The trainable student.
pub trait StudentModel {
    fn forward(&mut self, batch: &Batch) -> Result<ModelOutput>;

    /// Apply one optimizer step for the accumulated `loss`, clipping the
    /// gradient norm to `grad_clip`.
    fn step(&mut self, loss: f32, grad_clip: f32) -> Result<()>;

    /// Greedy generation for holdout evaluation.
    fn generate(&mut self, prompt: &str) -> Result<String>;

    /// Serialize the full student state to `path` (opaque blob).
    fn save_state(&self, path: &Path) -> Result<()>;

    /// Replace the student state from a blob written by
    /// [`save_state`](Self::save_state).
    fn load_state(&mut self, path: &Path) -> Result<()>;
}
