//! View models and request payloads for the case catalog.
//!
//! Responses are built by explicit builder functions so what each audience
//! sees is spelled out in one place: students never receive the answer key,
//! and the explanation is only included once they have completed the case.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use vetcase_db::models::{
    Case, LabTestGroup, LabTestKind, NewCase, ObservationOption, Slide, UserProgress,
};

/// Case as it appears in list responses.
#[derive(Debug, Clone, Serialize)]
pub struct CaseSummary {
    pub id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn case_summary(case: &Case) -> CaseSummary {
    CaseSummary {
        id: case.id,
        category_id: case.category_id,
        title: case.title.clone(),
        published: case.published,
        created_at: case.created_at,
        updated_at: case.updated_at,
    }
}

/// One selectable option; the answer flag is only present for staff.
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub id: i64,
    pub text: String,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabTestGroupView {
    pub id: i64,
    pub kind: LabTestKind,
    pub name: String,
    pub normal_range: String,
    pub result_text: String,
    pub position: i32,
    pub options: Vec<OptionView>,
}

/// Full case detail: the case text, its lab test groups with options, slides
/// and the caller's progress record.
#[derive(Debug, Serialize)]
pub struct CaseDetail {
    pub id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    pub history: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_diagnosis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub lab_tests: Vec<LabTestGroupView>,
    pub slides: Vec<Slide>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<UserProgress>,
}

/// Assemble the lab test views, grouping options under their groups.
pub fn build_lab_test_views(
    groups: Vec<LabTestGroup>,
    options: Vec<ObservationOption>,
    reveal_answers: bool,
) -> Vec<LabTestGroupView> {
    let mut by_group: HashMap<i64, Vec<OptionView>> = HashMap::new();
    for option in options {
        by_group
            .entry(option.lab_test_group_id)
            .or_default()
            .push(OptionView {
                id: option.id,
                text: option.text,
                position: option.position,
                is_correct: reveal_answers.then_some(option.is_correct),
            });
    }

    groups
        .into_iter()
        .map(|group| LabTestGroupView {
            options: by_group.remove(&group.id).unwrap_or_default(),
            id: group.id,
            kind: group.kind,
            name: group.name,
            normal_range: group.normal_range,
            result_text: group.result_text,
            position: group.position,
        })
        .collect()
}

/// Assemble the full detail view for one audience.
pub fn build_case_detail(
    case: Case,
    groups: Vec<LabTestGroup>,
    options: Vec<ObservationOption>,
    slides: Vec<Slide>,
    progress: Option<UserProgress>,
    reveal_answers: bool,
) -> CaseDetail {
    let completed = progress.as_ref().is_some_and(|p| p.completed);
    CaseDetail {
        id: case.id,
        category_id: case.category_id,
        title: case.title,
        history: case.history,
        correct_diagnosis: reveal_answers.then_some(case.correct_diagnosis),
        explanation: (reveal_answers || completed).then_some(case.explanation),
        published: case.published,
        created_at: case.created_at,
        updated_at: case.updated_at,
        lab_tests: build_lab_test_views(groups, options, reveal_answers),
        slides,
        progress,
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCaseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub history: String,
    #[validate(length(min = 1))]
    pub correct_diagnosis: String,
    #[serde(default)]
    pub explanation: String,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub published: bool,
}

impl CreateCaseRequest {
    pub fn into_new_case(self) -> NewCase {
        NewCase {
            category_id: self.category_id,
            title: self.title,
            history: self.history,
            correct_diagnosis: self.correct_diagnosis,
            explanation: self.explanation,
            published: self.published,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct OptionInput {
    #[validate(length(min = 1, max = 255))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceOptionsRequest {
    #[validate(nested)]
    pub options: Vec<OptionInput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn case() -> Case {
        Case {
            id: 1,
            category_id: None,
            title: "Anemic cat".to_string(),
            history: "3-year-old DSH".to_string(),
            correct_diagnosis: "IMHA".to_string(),
            explanation: "Spherocytes plus autoagglutination".to_string(),
            published: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn option(id: i64, group: i64, is_correct: bool) -> ObservationOption {
        ObservationOption {
            id,
            lab_test_group_id: group,
            text: format!("option {id}"),
            is_correct,
            position: id as i32,
        }
    }

    fn group(id: i64) -> LabTestGroup {
        LabTestGroup {
            id,
            case_id: 1,
            kind: LabTestKind::Cbc,
            name: "CBC".to_string(),
            normal_range: String::new(),
            result_text: String::new(),
            position: 0,
        }
    }

    #[test]
    fn test_answer_key_hidden_from_students() {
        let detail = build_case_detail(
            case(),
            vec![group(10)],
            vec![option(1, 10, true), option(2, 10, false)],
            vec![],
            None,
            false,
        );
        assert!(detail.correct_diagnosis.is_none());
        assert!(detail.explanation.is_none());
        assert!(
            detail.lab_tests[0]
                .options
                .iter()
                .all(|o| o.is_correct.is_none())
        );
    }

    #[test]
    fn test_answer_key_visible_to_staff() {
        let detail = build_case_detail(
            case(),
            vec![group(10)],
            vec![option(1, 10, true)],
            vec![],
            None,
            true,
        );
        assert_eq!(detail.correct_diagnosis.as_deref(), Some("IMHA"));
        assert!(detail.explanation.is_some());
        assert_eq!(detail.lab_tests[0].options[0].is_correct, Some(true));
    }

    #[test]
    fn test_explanation_revealed_after_completion() {
        let progress = UserProgress {
            id: 1,
            user_id: 7,
            case_id: 1,
            completed: true,
            correct_observations: 2,
            total_observations: 2,
            score: 100.0,
            attempts: 1,
            diagnosis_text: "IMHA".to_string(),
            is_diagnosis_correct: Some(true),
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            updated_at: Utc::now(),
        };
        let detail = build_case_detail(case(), vec![], vec![], vec![], Some(progress), false);
        assert!(detail.explanation.is_some());
        assert!(detail.correct_diagnosis.is_none(), "answer stays hidden");
    }

    #[test]
    fn test_options_grouped_under_their_group() {
        let views = build_lab_test_views(
            vec![group(10), group(11)],
            vec![option(1, 10, false), option(2, 11, false), option(3, 10, false)],
            false,
        );
        assert_eq!(views[0].options.len(), 2);
        assert_eq!(views[1].options.len(), 1);
    }
}
