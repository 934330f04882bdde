//! Curriculum schedule for phased distillation training.
//!
//! A schedule is an ordered list of named stages, each with an epoch quota.
//! The cursor only moves forward, advancing when the current stage's quota
//! is met and never past the last stage; the schedule is finished once the
//! last stage has consumed its quota.

use serde::{Deserialize, Serialize};

/// One curriculum phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub epochs: usize,
    pub completed: usize,
}

impl Stage {
    pub fn new(name: impl Into<String>, epochs: usize) -> Self {
        Stage {
            name: name.into(),
            epochs,
            completed: 0,
        }
    }
}

/// Stage names of the default four-phase curriculum.
pub const STAGE_DEFINITIONS_PARAPHRASE: &str = "definitions_paraphrase";
pub const STAGE_SHORT_ANALOGIES: &str = "short_analogies_factual_qa";
pub const STAGE_LONG_FORM_CHAINING: &str = "long_form_chaining";
pub const STAGE_CONSTRAINED_PIP: &str = "constrained_pip_tasks";

/// Forward-only stage manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumSchedule {
    stages: Vec<Stage>,
    current_idx: usize,
}

impl Default for CurriculumSchedule {
    /// The standard four-stage curriculum, two epochs each.
    fn default() -> Self {
        CurriculumSchedule::new(vec![
            Stage::new(STAGE_DEFINITIONS_PARAPHRASE, 2),
            Stage::new(STAGE_SHORT_ANALOGIES, 2),
            Stage::new(STAGE_LONG_FORM_CHAINING, 2),
            Stage::new(STAGE_CONSTRAINED_PIP, 2),
        ])
    }
}

impl CurriculumSchedule {
    /// # Panics
    ///
    /// Panics if `stages` is empty.
    pub fn new(stages: Vec<Stage>) -> Self {
        assert!(!stages.is_empty(), "curriculum needs at least one stage");
        CurriculumSchedule {
            stages,
            current_idx: 0,
        }
    }

    pub fn current_stage(&self) -> &Stage {
        &self.stages[self.current_idx]
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Count one finished epoch; advance to the next stage when the quota
    /// is met (the cursor never passes the last stage).
    pub fn step_epoch(&mut self) {
        let stage = &mut self.stages[self.current_idx];
        stage.completed += 1;
        if stage.completed >= stage.epochs && self.current_idx < self.stages.len() - 1 {
            self.current_idx += 1;
        }
    }

    /// True only on the last stage once its quota is met.
    pub fn is_finished(&self) -> bool {
        self.current_idx == self.stages.len() - 1
            && self.current_stage().completed >= self.current_stage().epochs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_by_two_finishes_after_eight_steps() {
        let mut schedule = CurriculumSchedule::default();
        for i in 0..7 {
            schedule.step_epoch();
            assert!(!schedule.is_finished(), "finished early at step {}", i + 1);
        }
        schedule.step_epoch();
        assert!(schedule.is_finished());
    }

    #[test]
    fn test_stage_transitions() {
        let mut schedule = CurriculumSchedule::default();
        assert_eq!(schedule.current_stage().name, STAGE_DEFINITIONS_PARAPHRASE);
        schedule.step_epoch();
        assert_eq!(schedule.current_stage().name, STAGE_DEFINITIONS_PARAPHRASE);
        schedule.step_epoch();
        assert_eq!(schedule.current_stage().name, STAGE_SHORT_ANALOGIES);
        for _ in 0..4 {
            schedule.step_epoch();
        }
        assert_eq!(schedule.current_stage().name, STAGE_CONSTRAINED_PIP);
    }

    #[test]
    fn test_cursor_never_passes_last_stage() {
        let mut schedule = CurriculumSchedule::new(vec![Stage::new("only", 1)]);
        for _ in 0..5 {
            schedule.step_epoch();
        }
        assert_eq!(schedule.current_stage().name, "only");
        assert!(schedule.is_finished());
    }

    #[test]
    #[should_panic(expected = "at least one stage")]
    fn test_empty_curriculum_panics() {
        CurriculumSchedule::new(Vec::new());
    }
}
