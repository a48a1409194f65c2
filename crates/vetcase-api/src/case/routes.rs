use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;

use vetcase_db::models::{Case, CaseCategory, CaseImportRow};
use vetcase_db::repositories::case as case_repo;
use vetcase_db::repositories::progress as progress_repo;

use crate::{
    ApiState,
    auth::{AuthUser, StaffUser},
    error::ApiError,
    subscription::require_active,
    validation::validate_payload,
};

use super::model::{
    CaseDetail, CaseSummary, CreateCaseRequest, LabTestGroupView, ReplaceOptionsRequest,
    build_case_detail, build_lab_test_views, case_summary,
};

/// Create the catalog routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/cases", get(list_cases).post(create_case))
        .route(
            "/cases/{id}",
            get(get_case_detail).put(update_case).delete(delete_case),
        )
        .route("/cases/{id}/lab-tests", get(list_lab_tests))
        .route("/lab-tests/{group_id}/options", put(replace_options))
        .route("/admin/cases/import", post(import_cases))
}

async fn list_categories(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<Vec<CaseCategory>>, ApiError> {
    require_active(&state.pool, &auth_user).await?;

    let categories = case_repo::list_categories(&state.pool).await?;
    Ok(Json(categories))
}

#[derive(Debug, Deserialize)]
struct ListCasesQuery {
    category: Option<String>,
    q: Option<String>,
}

async fn list_cases(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Query(query): Query<ListCasesQuery>,
) -> Result<Json<Vec<CaseSummary>>, ApiError> {
    require_active(&state.pool, &auth_user).await?;

    let cases = case_repo::list_cases(
        &state.pool,
        query.category.as_deref(),
        query.q.as_deref(),
        auth_user.staff,
    )
    .await?;

    Ok(Json(cases.iter().map(case_summary).collect()))
}

/// Fetch a case visible to this user, or 404.
async fn visible_case(
    state: &ApiState,
    case_id: i64,
    auth_user: &AuthUser,
) -> Result<Case, ApiError> {
    let case = case_repo::get_case(&state.pool, case_id)
        .await?
        .ok_or(ApiError::NotFound("case"))?;
    if !case.published && !auth_user.staff {
        return Err(ApiError::NotFound("case"));
    }
    Ok(case)
}

async fn get_case_detail(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(case_id): Path<i64>,
) -> Result<Json<CaseDetail>, ApiError> {
    require_active(&state.pool, &auth_user).await?;

    let case = visible_case(&state, case_id, &auth_user).await?;
    let groups = case_repo::lab_test_groups_for_case(&state.pool, case_id).await?;
    let options = case_repo::options_for_case(&state.pool, case_id).await?;
    let slides = case_repo::slides_for_case(&state.pool, case_id).await?;

    // Viewing a case starts its progress record
    let mut conn = state.pool.acquire().await?;
    let progress = progress_repo::get_or_start(&mut conn, auth_user.user_id, case_id).await?;

    Ok(Json(build_case_detail(
        case,
        groups,
        options,
        slides,
        Some(progress),
        auth_user.staff,
    )))
}

async fn list_lab_tests(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(case_id): Path<i64>,
) -> Result<Json<Vec<LabTestGroupView>>, ApiError> {
    require_active(&state.pool, &auth_user).await?;

    visible_case(&state, case_id, &auth_user).await?;
    let groups = case_repo::lab_test_groups_for_case(&state.pool, case_id).await?;
    let options = case_repo::options_for_case(&state.pool, case_id).await?;

    Ok(Json(build_lab_test_views(groups, options, auth_user.staff)))
}

async fn create_case(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Json(payload): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<Case>), ApiError> {
    validate_payload(&payload)?;

    let new_case = payload.into_new_case();
    let mut tx = state.pool.begin().await?;
    let case_id = case_repo::create_case_with_defaults(&mut tx, &new_case).await?;
    tx.commit().await?;

    let case = case_repo::get_case(&state.pool, case_id)
        .await?
        .ok_or(ApiError::NotFound("case"))?;
    Ok((StatusCode::CREATED, Json(case)))
}

async fn update_case(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Path(case_id): Path<i64>,
    Json(payload): Json<CreateCaseRequest>,
) -> Result<Json<Case>, ApiError> {
    validate_payload(&payload)?;

    let new_case = payload.into_new_case();
    let updated = case_repo::update_case(&state.pool, case_id, &new_case).await?;
    if updated == 0 {
        return Err(ApiError::NotFound("case"));
    }

    let case = case_repo::get_case(&state.pool, case_id)
        .await?
        .ok_or(ApiError::NotFound("case"))?;
    Ok(Json(case))
}

async fn delete_case(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Path(case_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = case_repo::delete_case(&state.pool, case_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("case"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn replace_options(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Path(group_id): Path<i64>,
    Json(payload): Json<ReplaceOptionsRequest>,
) -> Result<Json<Vec<vetcase_db::models::ObservationOption>>, ApiError> {
    validate_payload(&payload)?;

    case_repo::get_lab_test_group(&state.pool, group_id)
        .await?
        .ok_or(ApiError::NotFound("lab test group"))?;

    let options: Vec<(String, bool)> = payload
        .options
        .into_iter()
        .map(|o| (o.text, o.is_correct))
        .collect();

    let mut tx = state.pool.begin().await?;
    case_repo::replace_group_options(&mut tx, group_id, &options).await?;
    tx.commit().await?;

    let fresh = case_repo::options_for_group(&state.pool, group_id).await?;
    Ok(Json(fresh))
}

#[derive(Debug, Deserialize)]
struct ImportCasesRequest {
    rows: Vec<CaseImportRow>,
}

#[derive(Debug, serde::Serialize)]
struct ImportCasesResponse {
    created: u64,
    skipped: u64,
}

/// Bulk import of parsed spreadsheet rows. Rows missing a required field are
/// skipped, duplicate titles are ignored.
async fn import_cases(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Json(payload): Json<ImportCasesRequest>,
) -> Result<Json<ImportCasesResponse>, ApiError> {
    if payload.rows.is_empty() {
        return Err(ApiError::Validation("rows must not be empty".to_string()));
    }

    let mut tx = state.pool.begin().await?;
    let (created, skipped) = case_repo::import_cases(&mut tx, &payload.rows).await?;
    tx.commit().await?;

    tracing::info!(created, skipped, "bulk case import finished");
    Ok(Json(ImportCasesResponse { created, skipped }))
}
