use axum::http::StatusCode;
use serde_json::{Value, json};

use vetcase_db::models::SubscriptionKind;

use crate::common::{TestClient, TestStateBuilder, app, db, jwt, test_data};

async fn stored_status(pool: &sqlx::PgPool, user_id: i64) -> String {
    sqlx::query_scalar("SELECT status::text FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("status query")
}

#[tokio::test]
async fn test_lapsed_subscription_expires_on_read() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);

    // Active row whose end date is already in the past
    db::activate_subscription(&state.pool, user_id, -1)
        .await
        .expect("Failed to create subscription");

    let response = client.get_with_auth("/subscription", &token).await;
    response.assert_status(StatusCode::OK);
    let subscription: Value = response.json();
    assert_eq!(subscription["status"], "expired");

    // The correction is persisted, not just computed
    assert_eq!(stored_status(&state.pool, user_id).await, "expired");

    // And the catalog stays gated
    let response = client.get_with_auth("/cases", &token).await;
    response.assert_status(StatusCode::FORBIDDEN);

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn test_extend_expired_subscription_restarts_from_now() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let staff = jwt::staff_token(test_data::unique_user_id());

    // Lapsed 40 days ago
    db::activate_subscription(&state.pool, user_id, -40)
        .await
        .expect("Failed to create subscription");

    let response = client
        .post_json_with_auth(
            &format!("/admin/subscriptions/{user_id}/extend"),
            &json!({"days": 30}),
            &staff,
        )
        .await;
    response.assert_status(StatusCode::OK);
    let subscription: Value = response.json();

    assert_eq!(subscription["status"], "active");
    let days_remaining = subscription["days_remaining"].as_i64().expect("days");
    assert!(
        (28..=30).contains(&days_remaining),
        "stale end date must not be extended, got {days_remaining} days"
    );

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn test_extend_running_subscription_accumulates() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let staff = jwt::staff_token(test_data::unique_user_id());

    db::activate_subscription(&state.pool, user_id, 10)
        .await
        .expect("Failed to create subscription");

    let response = client
        .post_json_with_auth(
            &format!("/admin/subscriptions/{user_id}/extend"),
            &json!({"days": 30}),
            &staff,
        )
        .await;
    response.assert_status(StatusCode::OK);
    let subscription: Value = response.json();

    let days_remaining = subscription["days_remaining"].as_i64().expect("days");
    assert!(
        (38..=40).contains(&days_remaining),
        "running subscription keeps its remaining days, got {days_remaining}"
    );

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn test_admin_activate_and_cancel_lifecycle() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    let staff = jwt::staff_token(test_data::unique_user_id());

    let response = client
        .post_json_with_auth(
            &format!("/admin/subscriptions/{user_id}/activate"),
            &json!({}),
            &staff,
        )
        .await;
    response.assert_status(StatusCode::OK);
    let subscription: Value = response.json();
    assert_eq!(subscription["status"], "active");
    assert_eq!(subscription["kind"], "monthly");

    let response = client.get_with_auth("/cases", &token).await;
    response.assert_status(StatusCode::OK);

    let response = client
        .post_with_auth(&format!("/admin/subscriptions/{user_id}/cancel"), &staff)
        .await;
    response.assert_status(StatusCode::OK);
    let subscription: Value = response.json();
    assert_eq!(subscription["status"], "cancelled");

    let response = client.get_with_auth("/cases", &token).await;
    response.assert_status(StatusCode::FORBIDDEN);

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn test_admin_lifetime_activation_is_unlimited() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let user_id = test_data::unique_user_id();
    let staff = jwt::staff_token(test_data::unique_user_id());

    let response = client
        .post_json_with_auth(
            &format!("/admin/subscriptions/{user_id}/activate"),
            &json!({"kind": "lifetime"}),
            &staff,
        )
        .await;
    response.assert_status(StatusCode::OK);
    let subscription: Value = response.json();
    assert_eq!(subscription["status"], "active");
    assert!(subscription["end_date"].is_null());
    assert!(subscription["days_remaining"].is_null());

    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn test_plans_are_public() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let plan_id = db::create_plan(
        &state.pool,
        "Yearly access",
        SubscriptionKind::Yearly,
        Some(365),
        1_000_000,
    )
    .await
    .expect("Failed to create plan");

    let response = client.get("/plans").await;
    response.assert_status(StatusCode::OK);
    let plans: Value = response.json();

    let plan = plans
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"].as_i64() == Some(plan_id))
        .expect("created plan in listing");
    assert_eq!(plan["final_price"], 1_000_000);
    assert_eq!(plan["kind"], "yearly");

    db::delete_plan(&state.pool, plan_id).await.expect("cleanup");
}

#[tokio::test]
async fn test_subscription_admin_endpoints_require_staff() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state));

    let token = jwt::student_token(test_data::unique_user_id());
    let response = client
        .post_json_with_auth("/admin/subscriptions/1/activate", &json!({}), &token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}
