use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use validator::Validate;

use vetcase_db::models::Notification;
use vetcase_db::repositories::notification as notification_repo;

use crate::{
    ApiState,
    auth::{AuthUser, StaffUser},
    error::ApiError,
    validation::{validate_notification_kind, validate_payload},
};

/// Create the notification routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/{id}/read", post(mark_read))
        .route("/admin/notifications", post(create_notification))
}

async fn list_notifications(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let notifications = notification_repo::list_for_user(&state.pool, auth_user.user_id).await?;
    Ok(Json(notifications))
}

async fn mark_read(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(notification_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let updated =
        notification_repo::mark_read(&state.pool, notification_id, auth_user.user_id).await?;
    if updated == 0 {
        return Err(ApiError::NotFound("notification"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, Validate)]
struct CreateNotificationRequest {
    /// Target user; omit for a broadcast
    recipient_id: Option<i64>,
    #[validate(length(min = 1, max = 200))]
    title: String,
    #[validate(length(min = 1))]
    message: String,
    #[serde(default = "default_kind")]
    kind: String,
}

fn default_kind() -> String {
    "info".to_string()
}

async fn create_notification(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    validate_payload(&payload)?;
    validate_notification_kind(&payload.kind)?;

    let notification = notification_repo::create(
        &state.pool,
        payload.recipient_id,
        &payload.title,
        &payload.message,
        &payload.kind.to_lowercase(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(notification)))
}
