use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::common::{TestClient, TestStateBuilder, app, db, jwt, test_data};

#[tokio::test]
async fn test_viewing_a_case_starts_progress_lazily() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let title = test_data::unique_title("Lazy progress case");
    let case_id = db::create_case(&state.pool, &title, "Chronic hepatitis")
        .await
        .expect("Failed to create case");

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    db::activate_subscription(&state.pool, user_id, 30)
        .await
        .expect("Failed to create subscription");

    let response = client
        .get_with_auth(&format!("/cases/{case_id}"), &token)
        .await;
    response.assert_status(StatusCode::OK);
    let detail: Value = response.json();

    assert_eq!(detail["progress"]["attempts"], 0);
    assert_eq!(detail["progress"]["completed"], Value::Bool(false));

    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM user_progress WHERE user_id = $1 AND case_id = $2")
            .bind(user_id)
            .bind(case_id)
            .fetch_one(&state.pool)
            .await
            .expect("count query");
    assert_eq!(rows, 1);

    db::delete_case(&state.pool, case_id).await.expect("cleanup");
    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn test_submission_grades_and_overwrites_idempotently() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let title = test_data::unique_title("Graded case");
    let case_id = db::create_case(&state.pool, &title, "Chronic hepatitis")
        .await
        .expect("Failed to create case");
    let (group_id, option_ids) = db::add_cbc_group(
        &state.pool,
        case_id,
        &[("Neutrophilia", true), ("No abnormalities", false)],
    )
    .await
    .expect("Failed to create group");

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    db::activate_subscription(&state.pool, user_id, 30)
        .await
        .expect("Failed to create subscription");

    // Exactly the correct subset: both judgments right, loose diagnosis match
    let response = client
        .post_json_with_auth(
            &format!("/cases/{case_id}/submit"),
            &json!({
                "selections": [{"lab_test_group_id": group_id, "option_ids": [option_ids[0]]}],
                "diagnosis": "hepatitis",
            }),
            &token,
        )
        .await;
    response.assert_status(StatusCode::OK);
    let result: Value = response.json();
    assert_eq!(result["correct_count"], 2);
    assert_eq!(result["total_count"], 2);
    assert_eq!(result["accuracy_percentage"], 100.0);
    assert_eq!(result["is_diagnosis_correct"], Value::Bool(true));
    assert_eq!(result["attempts"], 1);

    // Selecting both options leaves one false positive
    let response = client
        .post_json_with_auth(
            &format!("/cases/{case_id}/submit"),
            &json!({
                "selections": [{"lab_test_group_id": group_id, "option_ids": option_ids}],
                "diagnosis": "Hepatic failure",
            }),
            &token,
        )
        .await;
    response.assert_status(StatusCode::OK);
    let result: Value = response.json();
    assert_eq!(result["correct_count"], 1);
    assert_eq!(result["accuracy_percentage"], 50.0);
    assert_eq!(result["is_diagnosis_correct"], Value::Bool(false));
    assert_eq!(result["attempts"], 2, "attempts accumulate across submissions");

    // Still exactly one row per (user, case); the second write won
    let (rows, score): (i64, f64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(MAX(score), -1)
        FROM user_progress
        WHERE user_id = $1 AND case_id = $2
        "#,
    )
    .bind(user_id)
    .bind(case_id)
    .fetch_one(&state.pool)
    .await
    .expect("count query");
    assert_eq!(rows, 1);
    assert_eq!(score, 50.0);

    // Profile stats were recomputed from the latest row
    let response = client.get_with_auth("/profile/stats", &token).await;
    response.assert_status(StatusCode::OK);
    let stats: Value = response.json();
    assert_eq!(stats["total_cases_completed"], 1);
    assert_eq!(stats["total_observations"], 2);
    assert_eq!(stats["total_correct_observations"], 1);
    assert_eq!(stats["total_correct_diagnoses"], 0);
    assert_eq!(stats["average_attempts_per_case"], 2.0);

    db::delete_case(&state.pool, case_id).await.expect("cleanup");
    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn test_empty_selection_scores_true_negatives() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let title = test_data::unique_title("Empty selection case");
    let case_id = db::create_case(&state.pool, &title, "Chronic hepatitis")
        .await
        .expect("Failed to create case");
    // N = 5 options, K = 2 correct
    db::add_cbc_group(
        &state.pool,
        case_id,
        &[
            ("Neutrophilia", true),
            ("Lymphopenia", true),
            ("No abnormalities", false),
            ("Eosinophilia", false),
            ("Monocytosis", false),
        ],
    )
    .await
    .expect("Failed to create group");

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    db::activate_subscription(&state.pool, user_id, 30)
        .await
        .expect("Failed to create subscription");

    let response = client
        .post_json_with_auth(
            &format!("/cases/{case_id}/submit"),
            &json!({"selections": [], "diagnosis": ""}),
            &token,
        )
        .await;
    response.assert_status(StatusCode::OK);
    let result: Value = response.json();
    assert_eq!(result["correct_count"], 3);
    assert_eq!(result["total_count"], 5);
    assert_eq!(result["accuracy_percentage"], 60.0);
    assert_eq!(result["is_diagnosis_correct"], Value::Bool(false));

    db::delete_case(&state.pool, case_id).await.expect("cleanup");
    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}

#[tokio::test]
async fn test_observation_log_is_append_only() {
    let state = TestStateBuilder::new()
        .build()
        .await
        .expect("Failed to create test state");
    let client = TestClient::new(app(state.clone()));

    let title = test_data::unique_title("Observation log case");
    let case_id = db::create_case(&state.pool, &title, "Chronic hepatitis")
        .await
        .expect("Failed to create case");
    let (group_id, _) = db::add_cbc_group(&state.pool, case_id, &[("Neutrophilia", true)])
        .await
        .expect("Failed to create group");

    let user_id = test_data::unique_user_id();
    let token = jwt::student_token(user_id);
    db::activate_subscription(&state.pool, user_id, 30)
        .await
        .expect("Failed to create subscription");

    for is_correct in [true, false] {
        let response = client
            .post_json_with_auth(
                &format!("/cases/{case_id}/observations"),
                &json!({
                    "lab_test_group_id": group_id,
                    "observation_text": "Neutrophilia",
                    "is_correct": is_correct,
                }),
                &token,
            )
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_observations WHERE user_id = $1 AND case_id = $2",
    )
    .bind(user_id)
    .bind(case_id)
    .fetch_one(&state.pool)
    .await
    .expect("count query");
    assert_eq!(rows, 2, "every pick is logged, nothing is overwritten");

    db::delete_case(&state.pool, case_id).await.expect("cleanup");
    db::delete_user_data(&state.pool, user_id)
        .await
        .expect("cleanup");
}
