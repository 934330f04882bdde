//! # qube-distill
//!
//! Curriculum-staged teacher→student distillation for the QUBE harness.
//!
//! - [`CurriculumSchedule`]: forward-only stage manager (four stages by
//!   default, `definitions_paraphrase` through `constrained_pip_tasks`)
//! - [`losses`]: token-level KD (KL + optional CE), concept-vector MSE, and
//!   the hypercube transition regularizer over plain logit vectors
//! - [`TeacherModel`]/[`StudentModel`]: opaque model collaborators; the
//!   student owns its serialized state as a blob identified by path
//! - [`CheckpointStore`]: tagged production/experimental checkpoints with a
//!   best-known-good rollback anchor
//! - [`Distiller`]: the epoch loop with the regression guard and the
//!   pre-PIP stage gate; any rollback is a terminal, audited outcome value
//!
//! ## Rollback semantics
//!
//! `run` returns `DistillOutcome { rolled_back, reason, .. }`. A rollback
//! restores the pre-distillation checkpoint and ends the run; it is never
//! retried, and it is never an `Err`.

pub mod checkpoint;
pub mod curriculum;
pub mod distiller;
pub mod losses;
pub mod model;

pub use checkpoint::{CheckpointMeta, CheckpointRecord, CheckpointStore};
pub use curriculum::{
    CurriculumSchedule, Stage, STAGE_CONSTRAINED_PIP, STAGE_DEFINITIONS_PARAPHRASE,
    STAGE_LONG_FORM_CHAINING, STAGE_SHORT_ANALOGIES,
};
pub use distiller::{
    DistillConfig, DistillOutcome, Distiller, HoldoutSample, MetricEvaluator,
};
pub use losses::{
    concept_regression_loss, log_softmax, softmax, token_distillation_loss, transition_penalty,
    IGNORE_LABEL,
};
pub use model::{Batch, ModelOutput, StudentModel, TeacherModel};
