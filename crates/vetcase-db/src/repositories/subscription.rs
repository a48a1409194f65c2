use sqlx::{Executor, Postgres};

use crate::models::{Subscription, SubscriptionKind, SubscriptionPlan};

pub async fn get_for_user<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Option<Subscription>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, kind, status, start_date, end_date, price,
                   auto_renew, transaction_id, created_at, updated_at
            FROM subscriptions
            WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Lazy status correction: flip an active row whose end date has passed to
/// expired. Called at every read site that gates access. Returns the number
/// of corrected rows (0 or 1).
pub async fn expire_if_lapsed<'e, E>(executor: E, user_id: i64) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE subscriptions
            SET status = 'expired', updated_at = NOW()
            WHERE user_id = $1
              AND status = 'active'
              AND end_date IS NOT NULL
              AND end_date < NOW()
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Whether the user currently holds an active, unexpired subscription.
/// Callers must run [`expire_if_lapsed`] first so the stored status is
/// consistent with what this returns.
pub async fn has_active<'e, E>(executor: E, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT EXISTS(
                SELECT 1 FROM subscriptions
                WHERE user_id = $1
                  AND status = 'active'
                  AND (end_date IS NULL OR end_date >= NOW())
            )
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
}

/// Activate (or re-activate) the user's subscription: status active, start
/// now, end now + duration, or unlimited when `duration_days` is `None`.
/// Re-activation overwrites the previous dates.
pub async fn activate<'e, E>(
    executor: E,
    user_id: i64,
    kind: SubscriptionKind,
    duration_days: Option<i32>,
    price: i64,
    transaction_id: Option<&str>,
) -> Result<Subscription, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO subscriptions (user_id, kind, status, start_date, end_date, price, transaction_id)
            VALUES ($1, $2, 'active', NOW(), NOW() + make_interval(days => $3), $4, $5)
            ON CONFLICT (user_id)
            DO UPDATE SET
                kind = $2,
                status = 'active',
                start_date = NOW(),
                end_date = NOW() + make_interval(days => $3),
                price = $4,
                transaction_id = COALESCE($5, subscriptions.transaction_id),
                updated_at = NOW()
            RETURNING id, user_id, kind, status, start_date, end_date, price,
                      auto_renew, transaction_id, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(kind)
    .bind(duration_days)
    .bind(price)
    .bind(transaction_id)
    .fetch_one(executor)
    .await
}

/// Extend the subscription by `days` and force it active: a still-running end
/// date is pushed out, a lapsed or missing one restarts from now, and an
/// unlimited subscription stays unlimited. Returns `None` when the user has
/// no subscription row.
pub async fn extend<'e, E>(
    executor: E,
    user_id: i64,
    days: i32,
) -> Result<Option<Subscription>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE subscriptions
            SET status = 'active',
                end_date = CASE
                    WHEN end_date IS NULL THEN NULL
                    WHEN end_date > NOW() THEN end_date + make_interval(days => $2)
                    ELSE NOW() + make_interval(days => $2)
                END,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING id, user_id, kind, status, start_date, end_date, price,
                      auto_renew, transaction_id, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(days)
    .fetch_optional(executor)
    .await
}

pub async fn cancel<'e, E>(executor: E, user_id: i64) -> Result<Option<Subscription>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE subscriptions
            SET status = 'cancelled', updated_at = NOW()
            WHERE user_id = $1
            RETURNING id, user_id, kind, status, start_date, end_date, price,
                      auto_renew, transaction_id, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn list_active_plans<'e, E>(executor: E) -> Result<Vec<SubscriptionPlan>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, name, kind, duration_days, price, discount_percent,
                   is_active, is_popular, position, created_at
            FROM subscription_plans
            WHERE is_active
            ORDER BY position, price
        "#,
    )
    .fetch_all(executor)
    .await
}

/// Plan lookup without the `is_active` filter, for payments that reference a
/// plan retired after checkout started.
pub async fn get_plan<'e, E>(
    executor: E,
    plan_id: i64,
) -> Result<Option<SubscriptionPlan>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, name, kind, duration_days, price, discount_percent,
                   is_active, is_popular, position, created_at
            FROM subscription_plans
            WHERE id = $1
        "#,
    )
    .bind(plan_id)
    .fetch_optional(executor)
    .await
}

pub async fn get_active_plan<'e, E>(
    executor: E,
    plan_id: i64,
) -> Result<Option<SubscriptionPlan>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, name, kind, duration_days, price, discount_percent,
                   is_active, is_popular, position, created_at
            FROM subscription_plans
            WHERE id = $1 AND is_active
        "#,
    )
    .bind(plan_id)
    .fetch_optional(executor)
    .await
}
