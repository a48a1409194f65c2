use std::collections::{HashMap, HashSet};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};

use vetcase_db::models::{UserObservation, UserProfileStats, UserProgress};
use vetcase_db::repositories::case as case_repo;
use vetcase_db::repositories::progress as progress_repo;
use vetcase_grading::{AnswerOption, GroupSubmission, grade};

use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    metrics,
    subscription::require_active,
    validation::validate_payload,
};

use super::model::{ObservationRequest, SubmissionResponse, SubmitCaseRequest};

/// Create the progress routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/cases/{id}/observations", post(log_observation))
        .route("/cases/{id}/submit", post(submit_case))
        .route("/progress", get(list_progress))
        .route("/profile/stats", get(profile_stats))
}

/// Append one observation pick to the student's log.
async fn log_observation(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(case_id): Path<i64>,
    Json(payload): Json<ObservationRequest>,
) -> Result<(StatusCode, Json<UserObservation>), ApiError> {
    require_active(&state.pool, &auth_user).await?;
    validate_payload(&payload)?;

    case_repo::get_case(&state.pool, case_id)
        .await?
        .ok_or(ApiError::NotFound("case"))?;

    let observation = progress_repo::insert_observation(
        &state.pool,
        auth_user.user_id,
        case_id,
        payload.lab_test_group_id,
        &payload.observation_text,
        payload.is_correct,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(observation)))
}

/// Grade a full case submission and persist the result.
async fn submit_case(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(case_id): Path<i64>,
    Json(payload): Json<SubmitCaseRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    require_active(&state.pool, &auth_user).await?;
    validate_payload(&payload)?;

    let case = case_repo::get_case(&state.pool, case_id)
        .await?
        .ok_or(ApiError::NotFound("case"))?;
    if !case.published && !auth_user.staff {
        return Err(ApiError::NotFound("case"));
    }

    let groups = case_repo::lab_test_groups_for_case(&state.pool, case_id).await?;
    let options = case_repo::options_for_case(&state.pool, case_id).await?;

    // Selections for groups that don't belong to this case are ignored;
    // every option of the case is judged, selected or not.
    let selected_by_group: HashMap<i64, HashSet<i64>> = payload
        .selections
        .iter()
        .map(|s| (s.lab_test_group_id, s.option_ids.iter().copied().collect()))
        .collect();

    let submissions: Vec<GroupSubmission> = groups
        .iter()
        .map(|group| GroupSubmission {
            options: options
                .iter()
                .filter(|o| o.lab_test_group_id == group.id)
                .map(|o| AnswerOption {
                    id: o.id,
                    is_correct: o.is_correct,
                })
                .collect(),
            selected: selected_by_group.get(&group.id).cloned().unwrap_or_default(),
        })
        .collect();

    let result = grade(
        &submissions,
        &payload.diagnosis,
        &case.correct_diagnosis,
        state.diagnosis_matcher,
    );

    // One transaction: overwrite the progress row, then recompute the
    // aggregate stats from source.
    let mut tx = state.pool.begin().await?;
    let progress = progress_repo::record_submission(
        &mut *tx,
        auth_user.user_id,
        case_id,
        result.correct_count,
        result.total_count,
        result.accuracy_percentage,
        &payload.diagnosis,
        result.diagnosis_correct,
    )
    .await?;
    progress_repo::recompute_profile_stats(&mut *tx, auth_user.user_id).await?;
    tx.commit().await?;

    metrics::record_case_submission(result.diagnosis_correct);

    Ok(Json(SubmissionResponse {
        correct_count: result.correct_count,
        total_count: result.total_count,
        accuracy_percentage: result.accuracy_percentage,
        is_diagnosis_correct: result.diagnosis_correct,
        attempts: progress.attempts,
    }))
}

async fn list_progress(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<Vec<UserProgress>>, ApiError> {
    let progress = progress_repo::list_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(progress))
}

async fn profile_stats(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<UserProfileStats>, ApiError> {
    let stats = progress_repo::get_profile_stats(&state.pool, auth_user.user_id)
        .await?
        .unwrap_or_else(|| UserProfileStats::empty(auth_user.user_id));
    Ok(Json(stats))
}
