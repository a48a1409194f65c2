use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use vetcase_db::models::SubscriptionKind;
use vetcase_db::repositories::subscription as subscription_repo;

use crate::{
    ApiState,
    auth::{AuthUser, StaffUser},
    error::ApiError,
    validation::validate_payload,
};

use super::model::{
    ActivateRequest, ExtendRequest, PlanView, SubscriptionView, plan_view, subscription_view,
};

/// Create the subscription routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/subscription", get(get_own_subscription))
        .route(
            "/admin/subscriptions/{user_id}/activate",
            post(activate_subscription),
        )
        .route(
            "/admin/subscriptions/{user_id}/extend",
            post(extend_subscription),
        )
        .route(
            "/admin/subscriptions/{user_id}/cancel",
            post(cancel_subscription),
        )
}

/// Active plans for the pricing page. Public.
async fn list_plans(State(state): State<ApiState>) -> Result<Json<Vec<PlanView>>, ApiError> {
    let plans = subscription_repo::list_active_plans(&state.pool).await?;
    Ok(Json(plans.iter().map(plan_view).collect()))
}

async fn get_own_subscription(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<SubscriptionView>, ApiError> {
    // Reading your own subscription is also a gating read site
    subscription_repo::expire_if_lapsed(&state.pool, auth_user.user_id).await?;

    let subscription = subscription_repo::get_for_user(&state.pool, auth_user.user_id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    Ok(Json(subscription_view(&subscription)))
}

async fn activate_subscription(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Json(payload): Json<ActivateRequest>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let kind = payload.kind.unwrap_or(SubscriptionKind::Monthly);
    let duration_days = payload
        .duration_days
        .or_else(|| kind.duration_days().map(|d| d as i32));

    let subscription =
        subscription_repo::activate(&state.pool, user_id, kind, duration_days, 0, None).await?;

    tracing::info!(user_id, ?kind, ?duration_days, "subscription activated by admin");
    Ok(Json(subscription_view(&subscription)))
}

async fn extend_subscription(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Json(payload): Json<ExtendRequest>,
) -> Result<Json<SubscriptionView>, ApiError> {
    validate_payload(&payload)?;

    let subscription = subscription_repo::extend(&state.pool, user_id, payload.days)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    tracing::info!(user_id, days = payload.days, "subscription extended by admin");
    Ok(Json(subscription_view(&subscription)))
}

async fn cancel_subscription(
    StaffUser(_): StaffUser,
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<SubscriptionView>, ApiError> {
    let subscription = subscription_repo::cancel(&state.pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("subscription"))?;

    tracing::info!(user_id, "subscription cancelled by admin");
    Ok(Json(subscription_view(&subscription)))
}
