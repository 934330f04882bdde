//! The distillation runner: curriculum-staged teacher→student training with
//! combined loss, checkpointing, and automatic rollback.
//!
//! Per epoch: teacher forward (read-only), student forward, combined loss
//! (token KD [+ CE] + concept MSE + stage-gated hypercube transition
//! penalty), student step with gradient clipping. After each epoch the
//! holdout metrics are re-evaluated and two guards can terminate the run:
//!
//! - **regression guard**: the primary metric dropping by more than
//!   `max_metric_drop` (fractionally) restores the pre-distillation
//!   checkpoint and ends the run;
//! - **stage gate**: finishing `long_form_chaining` with holdout coherence
//!   or factuality below 0.6 blocks the PIP stage the same way.
//!
//! Every rollback is terminal and audited; the outcome is a value, never an
//! exception.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use qube_core::AuditLog;

use crate::checkpoint::CheckpointStore;
use crate::curriculum::{CurriculumSchedule, STAGE_CONSTRAINED_PIP, STAGE_LONG_FORM_CHAINING};
use crate::losses::{concept_regression_loss, token_distillation_loss, transition_penalty};
use crate::model::{Batch, StudentModel, TeacherModel};

/// Holdout metrics source. A production harness plugs the multi-axis text
/// evaluator in here; tests script exact values.
pub trait MetricEvaluator {
    fn evaluate(&self, output: &str, reference: &str) -> BTreeMap<String, f64>;
}

impl<F> MetricEvaluator for F
where
    F: Fn(&str, &str) -> BTreeMap<String, f64>,
{
    fn evaluate(&self, output: &str, reference: &str) -> BTreeMap<String, f64> {
        self(output, reference)
    }
}

/// One holdout prompt/reference pair.
#[derive(Debug, Clone)]
pub struct HoldoutSample {
    pub prompt: String,
    pub reference: String,
}

/// Knobs of the distillation run.
#[derive(Debug, Clone)]
pub struct DistillConfig {
    /// Maximum tolerated fractional drop of the primary holdout metric.
    pub max_metric_drop: f64,
    /// Gradient norm clip passed to the student on every step.
    pub grad_clip: f32,
    /// Weight of the hypercube transition penalty in the combined loss.
    pub transition_penalty_weight: f32,
    /// Holdout samples evaluated per metrics pass.
    pub holdout_cap: usize,
}

impl Default for DistillConfig {
    fn default() -> Self {
        DistillConfig {
            max_metric_drop: 0.10,
            grad_clip: 1.0,
            transition_penalty_weight: 0.1,
            holdout_cap: 20,
        }
    }
}

impl DistillConfig {
    /// Builder: set the tolerated metric drop.
    pub fn with_max_metric_drop(mut self, drop: f64) -> Self {
        self.max_metric_drop = drop;
        self
    }
}

/// Result of a distillation run. A rollback is a normal terminal outcome.
#[derive(Debug, Clone)]
pub struct DistillOutcome {
    pub rolled_back: bool,
    pub reason: Option<String>,
    /// Last holdout metrics observed before the run ended.
    pub metrics: BTreeMap<String, f64>,
    pub epochs_run: usize,
}

/// Coordinates one teacher→student distillation run.
pub struct Distiller<'a, T: TeacherModel, S: StudentModel> {
    teacher: T,
    student: S,
    curriculum: CurriculumSchedule,
    evaluator: Option<&'a dyn MetricEvaluator>,
    holdout: Vec<HoldoutSample>,
    config: DistillConfig,
    checkpoints: CheckpointStore<'a>,
}

impl<'a, T: TeacherModel, S: StudentModel> Distiller<'a, T, S> {
    pub fn new(
        teacher: T,
        student: S,
        checkpoint_dir: &Path,
        audit: &'a AuditLog,
    ) -> Result<Self> {
        Ok(Distiller {
            teacher,
            student,
            curriculum: CurriculumSchedule::default(),
            evaluator: None,
            holdout: Vec::new(),
            config: DistillConfig::default(),
            checkpoints: CheckpointStore::new(checkpoint_dir, audit)?,
        })
    }

    /// Builder: replace the default curriculum.
    pub fn with_curriculum(mut self, curriculum: CurriculumSchedule) -> Self {
        self.curriculum = curriculum;
        self
    }

    /// Builder: evaluate holdout samples with `evaluator` after each epoch.
    pub fn with_holdout(
        mut self,
        samples: Vec<HoldoutSample>,
        evaluator: &'a dyn MetricEvaluator,
    ) -> Self {
        self.holdout = samples;
        self.evaluator = Some(evaluator);
        self
    }

    /// Builder: replace the config.
    pub fn with_config(mut self, config: DistillConfig) -> Self {
        self.config = config;
        self
    }

    pub fn curriculum(&self) -> &CurriculumSchedule {
        &self.curriculum
    }

    pub fn student(&self) -> &S {
        &self.student
    }

    /// Mean holdout metrics from student generations. Generation failures
    /// degrade to an empty output (scored, not raised).
    fn evaluate_holdout(&mut self) -> BTreeMap<String, f64> {
        let evaluator = match self.evaluator {
            Some(e) => e,
            None => return BTreeMap::new(),
        };
        if self.holdout.is_empty() {
            return BTreeMap::new();
        }
        let mut acc: BTreeMap<String, f64> = BTreeMap::new();
        let mut n = 0usize;
        for sample in self.holdout.iter().take(self.config.holdout_cap) {
            let output = self.student.generate(&sample.prompt).unwrap_or_default();
            for (k, v) in evaluator.evaluate(&output, &sample.reference) {
                *acc.entry(k).or_insert(0.0) += v;
            }
            n += 1;
        }
        if n > 0 {
            for v in acc.values_mut() {
                *v /= n as f64;
            }
        }
        acc
    }

    fn rollback(
        &mut self,
        anchor: &Path,
        reason: String,
        metrics: BTreeMap<String, f64>,
        epochs_run: usize,
    ) -> Result<DistillOutcome> {
        self.checkpoints.restore(anchor, &mut self.student)?;
        Ok(DistillOutcome {
            rolled_back: true,
            reason: Some(reason),
            metrics,
            epochs_run,
        })
    }

    /// Run up to `epochs` epochs over `batches`, or until the curriculum
    /// finishes. `experimental_stage` tags the per-epoch checkpoints.
    pub fn run(
        &mut self,
        batches: &[Batch],
        epochs: usize,
        experimental_stage: bool,
    ) -> Result<DistillOutcome> {
        // Rollback anchor and metric baseline, once, before any training.
        let pre = self.checkpoints.save("pre_distill", false, &self.student)?;
        let mut before = self.evaluate_holdout();

        for epoch in 0..epochs {
            let stage_name = self.curriculum.current_stage().name.clone();
            let allow_multi_bit = stage_name == STAGE_CONSTRAINED_PIP;

            for batch in batches {
                let step = self.train_batch(batch, allow_multi_bit);
                if let Err(e) = step {
                    // past the anchor checkpoint a failed collaborator ends
                    // the run through the rollback path, not a raw error
                    return self.rollback(
                        &pre.path,
                        format!("collaborator_failure: {}", e),
                        before,
                        epoch,
                    );
                }
            }

            self.curriculum.step_epoch();
            let name = format!(
                "epoch_{}_{}_{}",
                epoch,
                stage_name,
                if experimental_stage { "exp" } else { "prod" }
            );
            self.checkpoints.save(&name, experimental_stage, &self.student)?;

            let after = self.evaluate_holdout();

            // Regression guard on the primary metric.
            if !before.is_empty() && !after.is_empty() {
                let key = if before.contains_key("coherence") {
                    "coherence".to_string()
                } else {
                    before.keys().next().expect("non-empty").clone()
                };
                let b = before.get(&key).copied().unwrap_or(0.0);
                let a = after.get(&key).copied().unwrap_or(0.0);
                let drop = if b > 0.0 { (b - a) / b.max(1e-9) } else { 0.0 };
                if drop > self.config.max_metric_drop {
                    println!(
                        "distill: {} dropped {:.3} (> {:.3}), rolling back",
                        key, drop, self.config.max_metric_drop
                    );
                    return self.rollback(
                        &pre.path,
                        format!("metric_drop_{:.3}", drop),
                        after,
                        epoch + 1,
                    );
                }
            }

            // Stage gate: the PIP stage needs a solid long-form baseline.
            if stage_name == STAGE_LONG_FORM_CHAINING {
                let coherence = after.get("coherence").copied().unwrap_or(1.0);
                let factuality = after.get("factuality").copied().unwrap_or(1.0);
                if coherence < 0.6 || factuality < 0.6 {
                    println!(
                        "distill: stage gate failed (coherence {:.3}, factuality {:.3}), rolling back",
                        coherence, factuality
                    );
                    return self.rollback(
                        &pre.path,
                        "pre_pip_threshold_failed".to_string(),
                        after,
                        epoch + 1,
                    );
                }
            }

            before = after;
            if self.curriculum.is_finished() {
                return Ok(DistillOutcome {
                    rolled_back: false,
                    reason: None,
                    metrics: before,
                    epochs_run: epoch + 1,
                });
            }
        }

        Ok(DistillOutcome {
            rolled_back: false,
            reason: None,
            metrics: before,
            epochs_run: epochs,
        })
    }

    /// One batch: teacher forward (no mutation), student forward, combined
    /// loss, student step.
    fn train_batch(&mut self, batch: &Batch, allow_multi_bit: bool) -> Result<()> {
        let tea = self.teacher.forward(batch)?;
        let stu = self.student.forward(batch)?;

        let mut loss = 0.0f32;
        if !tea.logits.is_empty() && !stu.logits.is_empty() {
            loss += token_distillation_loss(&stu.logits, &tea.logits, batch.labels.as_deref());
        }
        if !tea.concepts.is_empty() && !stu.concepts.is_empty() {
            loss += concept_regression_loss(&stu.concepts, &tea.concepts);
        }
        if !tea.vertex_preds.is_empty() && !stu.vertex_preds.is_empty() {
            loss += transition_penalty(&stu.vertex_preds, allow_multi_bit)
                * self.config.transition_penalty_weight;
        }
        self.student.step(loss, self.config.grad_clip)
    }
}
