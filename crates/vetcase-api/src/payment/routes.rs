use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use vetcase_db::models::{Payment, PaymentStatus, SubscriptionPlan};
use vetcase_db::repositories::payment as payment_repo;
use vetcase_db::repositories::subscription as subscription_repo;

use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    metrics,
    validation::validate_payload,
};

use super::gateway::{CheckoutRequest, GatewayError};

/// Create the payment routes
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/payments/checkout", post(start_checkout))
        .route("/payments/callback", get(payment_callback))
        .route("/payments/{id}", get(get_payment))
}

#[derive(Debug, Deserialize, Validate)]
struct CheckoutBody {
    #[validate(range(min = 1))]
    plan_id: i64,
}

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    payment_id: i64,
    authority: String,
    redirect_url: String,
}

/// Start a checkout: persist a pending payment, then ask the gateway for a
/// redirect. On gateway rejection the payment is marked failed; on transport
/// trouble it stays pending and nothing else is mutated.
async fn start_checkout(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Json(payload): Json<CheckoutBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    validate_payload(&payload)?;

    let plan = subscription_repo::get_active_plan(&state.pool, payload.plan_id)
        .await?
        .ok_or(ApiError::NotFound("subscription plan"))?;

    let amount = plan.final_price();
    let description = format!("{} subscription", plan.name);

    let payment = payment_repo::create_pending(
        &state.pool,
        auth_user.user_id,
        plan.id,
        amount,
        state.gateway.name(),
        &description,
    )
    .await?;

    let checkout = CheckoutRequest {
        amount,
        description,
        callback_url: format!("{}/payments/callback", state.callback_base_url),
    };

    match state.gateway.create_checkout(&checkout).await {
        Ok(session) => {
            payment_repo::set_authority(&state.pool, payment.id, &session.authority).await?;
            metrics::record_payment_event("checkout", true);

            Ok(Json(CheckoutResponse {
                payment_id: payment.id,
                authority: session.authority,
                redirect_url: session.redirect_url,
            }))
        }
        Err(GatewayError::Rejected(code)) => {
            payment_repo::mark_failed(&state.pool, payment.id).await?;
            metrics::record_payment_event("checkout", false);
            Err(ApiError::Gateway(format!(
                "checkout rejected with code {code}"
            )))
        }
        Err(GatewayError::Transport(detail)) => {
            metrics::record_payment_event("checkout", false);
            Err(ApiError::Gateway(detail))
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(rename = "Authority", alias = "authority")]
    authority: Option<String>,
    #[serde(rename = "Status", alias = "status")]
    status: Option<String>,
}

/// Envelope returned to the gateway redirect.
#[derive(Debug, Serialize)]
struct CallbackResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ref_id: Option<String>,
}

/// Gateway callback. The whole transition runs in one transaction holding a
/// row lock on the payment, so a redelivered callback either sees `paid` and
/// short-circuits, or waits and then sees `paid`. Verification happens at
/// most once per payment.
async fn payment_callback(
    State(state): State<ApiState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<CallbackResponse>, ApiError> {
    let authority = query
        .authority
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::Validation("missing authority parameter".to_string()))?;
    let gateway_status = query.status.unwrap_or_default();

    let mut tx = state.pool.begin().await?;

    let payment = payment_repo::lock_by_authority(&mut tx, &authority)
        .await?
        .ok_or(ApiError::NotFound("payment"))?;

    match payment.status {
        PaymentStatus::Paid => {
            // Redelivery of a confirmed callback: no re-verify, no re-activation
            tx.commit().await?;
            return Ok(Json(CallbackResponse {
                success: true,
                message: "payment already confirmed".to_string(),
                payment_id: Some(payment.id),
                ref_id: payment.ref_id,
            }));
        }
        PaymentStatus::Pending => {}
        _ => {
            tx.commit().await?;
            return Ok(Json(CallbackResponse {
                success: false,
                message: "payment already processed".to_string(),
                payment_id: Some(payment.id),
                ref_id: None,
            }));
        }
    }

    if gateway_status != "OK" {
        payment_repo::mark_failed(&mut *tx, payment.id).await?;
        tx.commit().await?;
        metrics::record_payment_event("verify", false);

        return Ok(Json(CallbackResponse {
            success: false,
            message: "payment was cancelled at the gateway".to_string(),
            payment_id: Some(payment.id),
            ref_id: None,
        }));
    }

    match state.gateway.verify_checkout(&authority, payment.amount).await {
        Ok(verified) => {
            let subscription_id =
                grant_subscription(&mut tx, &payment, &verified.ref_id).await?;
            payment_repo::mark_paid(
                &mut *tx,
                payment.id,
                &verified.ref_id,
                verified.card_mask.as_deref(),
                subscription_id,
            )
            .await?;
            tx.commit().await?;
            metrics::record_payment_event("verify", true);

            tracing::info!(
                payment_id = payment.id,
                ref_id = %verified.ref_id,
                "payment verified, subscription granted"
            );

            Ok(Json(CallbackResponse {
                success: true,
                message: "payment confirmed".to_string(),
                payment_id: Some(payment.id),
                ref_id: Some(verified.ref_id),
            }))
        }
        Err(GatewayError::Rejected(code)) => {
            payment_repo::mark_failed(&mut *tx, payment.id).await?;
            tx.commit().await?;
            metrics::record_payment_event("verify", false);

            tracing::warn!(payment_id = payment.id, code, "payment verification rejected");
            Ok(Json(CallbackResponse {
                success: false,
                message: "payment verification failed".to_string(),
                payment_id: Some(payment.id),
                ref_id: None,
            }))
        }
        Err(GatewayError::Transport(detail)) => {
            // Leave the payment pending; the gateway will redeliver
            drop(tx);
            metrics::record_payment_event("verify", false);
            tracing::error!(payment_id = payment.id, "gateway verification unreachable: {detail}");

            Ok(Json(CallbackResponse {
                success: false,
                message: "payment verification is temporarily unavailable".to_string(),
                payment_id: Some(payment.id),
                ref_id: None,
            }))
        }
    }
}

/// Activate or extend the payer's subscription from the purchased plan,
/// inside the callback's transaction. A running subscription is extended so
/// remaining days are kept; anything else is a fresh activation.
async fn grant_subscription(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    payment: &Payment,
    ref_id: &str,
) -> Result<i64, ApiError> {
    let plan: Option<SubscriptionPlan> = match payment.plan_id {
        Some(plan_id) => subscription_repo::get_plan(&mut **tx, plan_id).await?,
        None => None,
    };

    let (kind, duration_days) = match &plan {
        Some(plan) => (
            plan.kind,
            plan.duration_days
                .or_else(|| plan.kind.duration_days().map(|d| d as i32)),
        ),
        // The plan row disappeared since checkout; fall back to a month
        None => (
            vetcase_db::models::SubscriptionKind::Monthly,
            Some(30),
        ),
    };

    let subscription = match duration_days {
        None => {
            subscription_repo::activate(
                &mut **tx,
                payment.user_id,
                kind,
                None,
                payment.amount,
                Some(ref_id),
            )
            .await?
        }
        Some(days) => {
            let existing = subscription_repo::get_for_user(&mut **tx, payment.user_id).await?;
            let running = existing.is_some_and(|s| s.is_active_at(Utc::now()));
            if running {
                match subscription_repo::extend(&mut **tx, payment.user_id, days).await? {
                    Some(subscription) => subscription,
                    None => {
                        subscription_repo::activate(
                            &mut **tx,
                            payment.user_id,
                            kind,
                            Some(days),
                            payment.amount,
                            Some(ref_id),
                        )
                        .await?
                    }
                }
            } else {
                subscription_repo::activate(
                    &mut **tx,
                    payment.user_id,
                    kind,
                    Some(days),
                    payment.amount,
                    Some(ref_id),
                )
                .await?
            }
        }
    };

    Ok(subscription.id)
}

async fn get_payment(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(payment_id): Path<i64>,
) -> Result<Json<Payment>, ApiError> {
    let payment = payment_repo::get_for_user(&state.pool, payment_id, auth_user.user_id)
        .await?
        .ok_or(ApiError::NotFound("payment"))?;
    Ok(Json(payment))
}
