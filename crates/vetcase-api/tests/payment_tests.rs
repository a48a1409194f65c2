use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use vetcase_api::payment::gateway::SandboxGateway;
use vetcase_db::models::SubscriptionKind;

use crate::common::{TestClient, TestStateBuilder, app, db, jwt, test_data};

async fn payment_status(pool: &sqlx::PgPool, payment_id: i64) -> String {
    sqlx::query_scalar("SELECT status::text FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_one(pool)
        .await
        .expect("status query")
}

async fn subscription_end(pool: &sqlx::PgPool, user_id: i64) -> Option<DateTime<Utc>> {
    sqlx::query_scalar("SELECT end_date FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("end_date query")
}

/// Run a checkout and return `(payment_id, authority)`.
async fn checkout(client: &TestClient, token: &str, plan_id: i64) -> (i64, String) {
    let response = client
        .post_json_with_auth("/payments/checkout", &json!({"plan_id": plan_id}), token)
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    (
        body["payment_id"].as_i64().expect("payment_id"),
        body["authority"].as_str().expect("authority").to_string(),
    )
}

#[tokio::test]
async fn test_checkout_creates_pending_payment() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    let plan_id = db::create_plan(
        &state.pool,
        "Monthly access",
        SubscriptionKind::Monthly,
        Some(30),
        150_000,
    )
    .await
    .expect("Failed to create plan");

    let response = client
        .post_json_with_auth("/payments/checkout", &json!({"plan_id": plan_id}), &token)
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();

    let payment_id = body["payment_id"].as_i64().expect("payment_id");
    let authority = body["authority"].as_str().expect("authority");
    assert!(body["redirect_url"].as_str().unwrap().contains(authority));

    assert_eq!(payment_status(&state.pool, payment_id).await, "pending");

    // The owner can read their payment back
    let response = client
        .get_with_auth(&format!("/payments/{payment_id}"), &token)
        .await;
    response.assert_status(StatusCode::OK);
    let payment: Value = response.json();
    assert_eq!(payment["status"], "pending");
    assert_eq!(payment["amount"], 150_000);

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
    db::delete_plan(&state.pool, plan_id).await.expect("cleanup");
}

#[tokio::test]
async fn test_successful_callback_activates_once() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    let plan_id = db::create_plan(
        &state.pool,
        "Monthly access",
        SubscriptionKind::Monthly,
        Some(30),
        150_000,
    )
    .await
    .expect("Failed to create plan");

    let (payment_id, authority) = checkout(&client, &token, plan_id).await;

    let callback_uri = format!("/payments/callback?Authority={authority}&Status=OK");
    let response = client.get(&callback_uri).await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], Value::Bool(true));
    let ref_id = body["ref_id"].as_str().expect("ref_id").to_string();

    assert_eq!(payment_status(&state.pool, payment_id).await, "paid");

    let response = client.get_with_auth("/subscription", &token).await;
    response.assert_status(StatusCode::OK);
    let subscription: Value = response.json();
    assert_eq!(subscription["status"], "active");

    let end_after_first = subscription_end(&state.pool, user_id).await;

    // Redelivered callback: short-circuits without re-verifying or
    // re-activating
    let response = client.get(&callback_uri).await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["message"], "payment already confirmed");
    assert_eq!(body["ref_id"].as_str(), Some(ref_id.as_str()));

    let end_after_second = subscription_end(&state.pool, user_id).await;
    assert_eq!(
        end_after_first, end_after_second,
        "duplicate callback must not extend the subscription again"
    );

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
    db::delete_plan(&state.pool, plan_id).await.expect("cleanup");
}

#[tokio::test]
async fn test_cancelled_callback_marks_payment_failed() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    let plan_id = db::create_plan(
        &state.pool,
        "Monthly access",
        SubscriptionKind::Monthly,
        Some(30),
        150_000,
    )
    .await
    .expect("Failed to create plan");

    let (payment_id, authority) = checkout(&client, &token, plan_id).await;

    let response = client
        .get(&format!("/payments/callback?Authority={authority}&Status=NOK"))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], Value::Bool(false));

    assert_eq!(payment_status(&state.pool, payment_id).await, "failed");

    // No subscription was granted
    let response = client.get_with_auth("/subscription", &token).await;
    response.assert_status(StatusCode::NOT_FOUND);

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
    db::delete_plan(&state.pool, plan_id).await.expect("cleanup");
}

#[tokio::test]
async fn test_rejected_verification_marks_payment_failed() {
    let state = TestStateBuilder::new()
        .with_gateway(Arc::new(SandboxGateway::rejecting()))
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    let plan_id = db::create_plan(
        &state.pool,
        "Monthly access",
        SubscriptionKind::Monthly,
        Some(30),
        150_000,
    )
    .await
    .expect("Failed to create plan");

    let (payment_id, authority) = checkout(&client, &token, plan_id).await;

    let response = client
        .get(&format!("/payments/callback?Authority={authority}&Status=OK"))
        .await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["success"], Value::Bool(false));

    assert_eq!(payment_status(&state.pool, payment_id).await, "failed");

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
    db::delete_plan(&state.pool, plan_id).await.expect("cleanup");
}

#[tokio::test]
async fn test_callback_with_unknown_authority_is_not_found() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state));

    let response = client
        .get("/payments/callback?Authority=S0000000000000000000000000000000000&Status=OK")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_checkout_with_unknown_plan_is_not_found() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state));

    let token = jwt::student_token(test_data::unique_user_id());
    let response = client
        .post_json_with_auth("/payments/checkout", &json!({"plan_id": 999_999_999}), &token)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
