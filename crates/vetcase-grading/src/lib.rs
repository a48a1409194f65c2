//! Grading engine for VetCase
//!
//! This crate scores a student's submission for one clinical case: the set of
//! observation options they marked per lab test group, plus a free-text
//! diagnosis compared against the case's reference diagnosis. It is pure
//! computation; callers persist the result.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One selectable statement within a lab test group, with its answer-key flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOption {
    /// Option identifier
    pub id: i64,
    /// Whether this option belongs to the correct set for its group
    pub is_correct: bool,
}

/// A student's submission for a single lab test group.
///
/// `selected` holds the ids the student marked as observed. Every option of
/// the group is judged: selecting a correct option and leaving an incorrect
/// option unselected both count as correct judgments. Ids in `selected` that
/// are not part of `options` belong to no judgment and are ignored.
#[derive(Debug, Clone)]
pub struct GroupSubmission {
    /// The full option universe of the group
    pub options: Vec<AnswerOption>,
    /// Option ids the student marked as observed
    pub selected: HashSet<i64>,
}

/// How a submitted diagnosis is compared against the reference diagnosis.
///
/// The source system used bare substring containment, which over-matches
/// one-word partials and under-matches rephrasings. The policy is therefore a
/// value rather than a hard-coded rule, so callers can tighten it without
/// touching the grading flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisMatcher {
    /// Case-insensitive containment of the trimmed submission within the
    /// reference text. An empty submission never matches.
    #[default]
    Substring,
    /// Trimmed, case-insensitive equality.
    Exact,
    /// Every alphanumeric word of the submission appears in the reference.
    Keywords,
}

impl DiagnosisMatcher {
    /// Compare a submitted diagnosis against the reference diagnosis.
    pub fn matches(&self, submitted: &str, reference: &str) -> bool {
        let submitted = submitted.trim().to_lowercase();
        let reference = reference.trim().to_lowercase();
        if submitted.is_empty() || reference.is_empty() {
            return false;
        }
        match self {
            Self::Substring => reference.contains(&submitted),
            Self::Exact => submitted == reference,
            Self::Keywords => {
                let reference_words: HashSet<String> = words(&reference).collect();
                let submitted_words: Vec<String> = words(&submitted).collect();
                !submitted_words.is_empty()
                    && submitted_words.iter().all(|w| reference_words.contains(w))
            }
        }
    }
}

fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
}

/// Outcome of grading one case submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    /// Number of options whose selection state matched the answer key
    pub correct_count: i32,
    /// Total number of options judged across all groups
    pub total_count: i32,
    /// `correct_count / total_count` scaled to 0-100, one decimal place
    pub accuracy_percentage: f64,
    /// Whether the submitted diagnosis matched the reference
    pub diagnosis_correct: bool,
}

/// Count correct judgments across all groups.
///
/// Returns `(correct_count, total_count)`.
pub fn score_groups(groups: &[GroupSubmission]) -> (i32, i32) {
    let mut correct = 0;
    let mut total = 0;
    for group in groups {
        for option in &group.options {
            let chosen = group.selected.contains(&option.id);
            if chosen == option.is_correct {
                correct += 1;
            }
            total += 1;
        }
    }
    (correct, total)
}

/// Accuracy as a percentage rounded to one decimal place.
///
/// A case with no options grades to `0.0` rather than dividing by zero.
pub fn accuracy_percentage(correct_count: i32, total_count: i32) -> f64 {
    if total_count == 0 {
        return 0.0;
    }
    let raw = f64::from(correct_count) / f64::from(total_count) * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Grade one full case submission.
pub fn grade(
    groups: &[GroupSubmission],
    diagnosis: &str,
    reference_diagnosis: &str,
    matcher: DiagnosisMatcher,
) -> GradingResult {
    let (correct_count, total_count) = score_groups(groups);
    GradingResult {
        correct_count,
        total_count,
        accuracy_percentage: accuracy_percentage(correct_count, total_count),
        diagnosis_correct: matcher.matches(diagnosis, reference_diagnosis),
    }
}
