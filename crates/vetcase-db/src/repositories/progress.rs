use sqlx::{Executor, PgConnection, Postgres};

use crate::models::{UserObservation, UserProfileStats, UserProgress};

/// Get the progress record for (user, case), creating an empty one on first
/// view. The unique constraint makes concurrent first views converge on a
/// single row.
pub async fn get_or_start(
    conn: &mut PgConnection,
    user_id: i64,
    case_id: i64,
) -> Result<UserProgress, sqlx::Error> {
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO user_progress (user_id, case_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, case_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(case_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, case_id, completed, correct_observations,
                   total_observations, score, attempts, diagnosis_text,
                   is_diagnosis_correct, started_at, completed_at, updated_at
            FROM user_progress
            WHERE user_id = $1 AND case_id = $2
        "#,
    )
    .bind(user_id)
    .bind(case_id)
    .fetch_one(&mut *conn)
    .await
}

/// Record a graded submission: one atomic upsert that overwrites the previous
/// result and bumps the attempt counter. Last write wins.
#[allow(clippy::too_many_arguments)]
pub async fn record_submission<'e, E>(
    executor: E,
    user_id: i64,
    case_id: i64,
    correct_observations: i32,
    total_observations: i32,
    score: f64,
    diagnosis_text: &str,
    is_diagnosis_correct: bool,
) -> Result<UserProgress, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO user_progress (user_id, case_id, completed, correct_observations,
                                       total_observations, score, attempts, diagnosis_text,
                                       is_diagnosis_correct, completed_at)
            VALUES ($1, $2, TRUE, $3, $4, $5, 1, $6, $7, NOW())
            ON CONFLICT (user_id, case_id)
            DO UPDATE SET
                completed = TRUE,
                correct_observations = $3,
                total_observations = $4,
                score = $5,
                attempts = user_progress.attempts + 1,
                diagnosis_text = $6,
                is_diagnosis_correct = $7,
                completed_at = NOW(),
                updated_at = NOW()
            RETURNING id, user_id, case_id, completed, correct_observations,
                      total_observations, score, attempts, diagnosis_text,
                      is_diagnosis_correct, started_at, completed_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(case_id)
    .bind(correct_observations)
    .bind(total_observations)
    .bind(score)
    .bind(diagnosis_text)
    .bind(is_diagnosis_correct)
    .fetch_one(executor)
    .await
}

pub async fn list_for_user<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<UserProgress>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, case_id, completed, correct_observations,
                   total_observations, score, attempts, diagnosis_text,
                   is_diagnosis_correct, started_at, completed_at, updated_at
            FROM user_progress
            WHERE user_id = $1
            ORDER BY completed_at DESC NULLS LAST, started_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Recompute the user's aggregate stats from their completed progress rows.
/// A full recompute, not an incremental update, so repeated submissions can
/// never drift the counters.
pub async fn recompute_profile_stats<'e, E>(executor: E, user_id: i64) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            INSERT INTO user_profile_stats (user_id, total_cases_completed,
                                            total_correct_observations, total_observations,
                                            total_correct_diagnoses, total_diagnoses,
                                            average_attempts_per_case, updated_at)
            SELECT $1,
                   COUNT(*)::int,
                   COALESCE(SUM(correct_observations), 0)::int,
                   COALESCE(SUM(total_observations), 0)::int,
                   COUNT(*) FILTER (WHERE is_diagnosis_correct)::int,
                   COUNT(*)::int,
                   CASE WHEN COUNT(*) > 0
                        THEN SUM(attempts)::float8 / COUNT(*)::float8
                        ELSE 0.0
                   END,
                   NOW()
            FROM user_progress
            WHERE user_id = $1 AND completed
            ON CONFLICT (user_id)
            DO UPDATE SET
                total_cases_completed = EXCLUDED.total_cases_completed,
                total_correct_observations = EXCLUDED.total_correct_observations,
                total_observations = EXCLUDED.total_observations,
                total_correct_diagnoses = EXCLUDED.total_correct_diagnoses,
                total_diagnoses = EXCLUDED.total_diagnoses,
                average_attempts_per_case = EXCLUDED.average_attempts_per_case,
                updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_profile_stats<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<UserProfileStats>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT user_id, total_cases_completed, total_correct_observations,
                   total_observations, total_correct_diagnoses, total_diagnoses,
                   average_attempts_per_case, updated_at
            FROM user_profile_stats
            WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Append one observation pick to the running log.
pub async fn insert_observation<'e, E>(
    executor: E,
    user_id: i64,
    case_id: i64,
    lab_test_group_id: Option<i64>,
    observation_text: &str,
    is_correct: bool,
) -> Result<UserObservation, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO user_observations (user_id, case_id, lab_test_group_id,
                                           observation_text, is_correct)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, case_id, lab_test_group_id, observation_text,
                      is_correct, selected_at
        "#,
    )
    .bind(user_id)
    .bind(case_id)
    .bind(lab_test_group_id)
    .bind(observation_text)
    .bind(is_correct)
    .fetch_one(executor)
    .await
}
