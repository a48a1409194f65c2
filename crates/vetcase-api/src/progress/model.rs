use serde::{Deserialize, Serialize};
use validator::Validate;

/// The options a student marked within one lab test group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupSelection {
    pub lab_test_group_id: i64,
    #[serde(default)]
    pub option_ids: Vec<i64>,
}

/// Full case submission: selections per group plus the free-text diagnosis.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitCaseRequest {
    #[serde(default)]
    pub selections: Vec<GroupSelection>,
    #[validate(length(max = 2000))]
    #[serde(default)]
    pub diagnosis: String,
}

/// One observation pick appended to the running log.
#[derive(Debug, Deserialize, Validate)]
pub struct ObservationRequest {
    pub lab_test_group_id: Option<i64>,
    #[validate(length(min = 1, max = 255))]
    pub observation_text: String,
    pub is_correct: bool,
}

/// Grading outcome returned to the student.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub correct_count: i32,
    pub total_count: i32,
    pub accuracy_percentage: f64,
    pub is_diagnosis_correct: bool,
    pub attempts: i32,
}
