//! Distillation and regularization losses over plain logit vectors.
//!
//! The student and teacher are opaque collaborators; everything here works
//! on the `Vec<f32>` logits and vertex-id sequences they emit, so no tensor
//! backend is involved:
//!
//! - token-level knowledge distillation: mean KL(teacher ‖ student) over
//!   positions, optionally plus cross-entropy against labels
//! - concept-vector regression: elementwise MSE
//! - hypercube-transition regularizer: penalizes consecutive predicted
//!   vertices at Hamming distance > 1 (multi-bit jumps)

/// Label id skipped by the cross-entropy term.
pub const IGNORE_LABEL: i64 = -100;

/// Numerically stable softmax (max-shifted).
pub fn softmax(xs: &[f32]) -> Vec<f32> {
    let max = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = xs.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Numerically stable log-softmax (max-shifted).
pub fn log_softmax(xs: &[f32]) -> Vec<f32> {
    let max = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let log_sum: f32 = xs.iter().map(|&x| (x - max).exp()).sum::<f32>().ln();
    xs.iter().map(|&x| x - max - log_sum).collect()
}

/// KL divergence between teacher soft targets and student log-probs,
/// averaged over positions ("batchmean"). When `labels` is provided, adds
/// the mean cross-entropy of the student logits against them
/// ([`IGNORE_LABEL`] positions are skipped).
///
/// # Panics
///
/// Panics on mismatched position counts or vocabulary sizes.
pub fn token_distillation_loss(
    student_logits: &[Vec<f32>],
    teacher_logits: &[Vec<f32>],
    labels: Option<&[i64]>,
) -> f32 {
    assert_eq!(
        student_logits.len(),
        teacher_logits.len(),
        "position counts must match"
    );
    if student_logits.is_empty() {
        return 0.0;
    }

    let mut kd = 0.0f32;
    for (stu, tea) in student_logits.iter().zip(teacher_logits.iter()) {
        assert_eq!(stu.len(), tea.len(), "vocabulary sizes must match");
        let teacher_probs = softmax(tea);
        let student_logp = log_softmax(stu);
        for (&p, &logq) in teacher_probs.iter().zip(student_logp.iter()) {
            // p * (ln p - ln q)
            if p > 0.0 {
                kd += p * (p.ln() - logq);
            }
        }
    }
    let mut loss = kd / student_logits.len() as f32;

    if let Some(labels) = labels {
        assert_eq!(
            labels.len(),
            student_logits.len(),
            "one label per position"
        );
        let mut ce = 0.0f32;
        let mut counted = 0usize;
        for (stu, &label) in student_logits.iter().zip(labels.iter()) {
            if label == IGNORE_LABEL {
                continue;
            }
            let idx = usize::try_from(label).expect("label must index the vocabulary");
            assert!(idx < stu.len(), "label {} out of vocabulary", label);
            ce += -log_softmax(stu)[idx];
            counted += 1;
        }
        if counted > 0 {
            loss += ce / counted as f32;
        }
    }
    loss
}

/// Mean squared error between student and teacher concept vectors.
///
/// # Panics
///
/// Panics on mismatched dimensions.
pub fn concept_regression_loss(student: &[f32], teacher: &[f32]) -> f32 {
    assert_eq!(student.len(), teacher.len(), "concept dims must match");
    if student.is_empty() {
        return 0.0;
    }
    student
        .iter()
        .zip(teacher.iter())
        .map(|(&s, &t)| (s - t) * (s - t))
        .sum::<f32>()
        / student.len() as f32
}

/// Penalty for multi-bit jumps in predicted vertex sequences: each
/// consecutive pair at Hamming distance `h > 1` contributes `h - 1`,
/// normalized by the number of sequences. Zero when multi-bit jumps are
/// allowed (the final PIP stage).
pub fn transition_penalty(vertex_seqs: &[Vec<u32>], allow_multi_bit: bool) -> f32 {
    if allow_multi_bit || vertex_seqs.is_empty() {
        return 0.0;
    }
    let mut total = 0u32;
    for seq in vertex_seqs {
        for pair in seq.windows(2) {
            let h = (pair[0] ^ pair[1]).count_ones();
            if h > 1 {
                total += h - 1;
            }
        }
    }
    total as f32 / vertex_seqs.len().max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_log_softmax_matches_softmax() {
        let xs = [0.3f32, -1.2, 2.5];
        let probs = softmax(&xs);
        let logp = log_softmax(&xs);
        for (p, lp) in probs.iter().zip(logp.iter()) {
            assert!((p.ln() - lp).abs() < 1e-5);
        }
    }

    #[test]
    fn test_kd_loss_zero_for_identical_logits() {
        let logits = vec![vec![0.5f32, 1.5, -0.2], vec![2.0, 0.0, 0.0]];
        let loss = token_distillation_loss(&logits, &logits, None);
        assert!(loss.abs() < 1e-6);
    }

    #[test]
    fn test_kd_loss_positive_for_diverging_logits() {
        let student = vec![vec![0.0f32, 0.0, 5.0]];
        let teacher = vec![vec![5.0f32, 0.0, 0.0]];
        assert!(token_distillation_loss(&student, &teacher, None) > 1.0);
    }

    #[test]
    fn test_cross_entropy_term_skips_ignored_labels() {
        let student = vec![vec![0.0f32, 10.0], vec![10.0, 0.0]];
        let teacher = student.clone();
        let base = token_distillation_loss(&student, &teacher, None);
        // correct labels add little; ignored labels add nothing
        let with_labels = token_distillation_loss(&student, &teacher, Some(&[1, IGNORE_LABEL]));
        assert!(with_labels > base);
        assert!(with_labels - base < 0.01);
        // a wrong label is expensive
        let wrong = token_distillation_loss(&student, &teacher, Some(&[0, IGNORE_LABEL]));
        assert!(wrong > 5.0);
    }

    #[test]
    fn test_concept_mse() {
        assert_eq!(concept_regression_loss(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        let loss = concept_regression_loss(&[1.0, 2.0], &[0.0, 0.0]);
        assert!((loss - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_transition_penalty_counts_excess_bits() {
        // 0 -> 1 (1 bit, free), 1 -> 7 (2 bits, costs 1), 7 -> 0 (3 bits, costs 2)
        let seqs = vec![vec![0u32, 1, 7, 0]];
        let penalty = transition_penalty(&seqs, false);
        assert!((penalty - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_transition_penalty_gated_by_allow_multi_bit() {
        let seqs = vec![vec![0u32, 7]];
        assert!(transition_penalty(&seqs, false) > 0.0);
        assert_eq!(transition_penalty(&seqs, true), 0.0);
    }

    #[test]
    fn test_transition_penalty_normalized_by_batch() {
        let one = vec![vec![0u32, 3]]; // 2-bit jump: penalty 1
        let two = vec![vec![0u32, 3], vec![0u32, 1]]; // second sequence free
        assert!((transition_penalty(&one, false) - 1.0).abs() < 1e-6);
        assert!((transition_penalty(&two, false) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_bit_paths_are_free() {
        let seqs = vec![vec![0u32, 1, 3, 2, 6]];
        assert_eq!(transition_penalty(&seqs, false), 0.0);
    }
}
