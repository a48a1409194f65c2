use sqlx::{Executor, PgConnection, Postgres};

use crate::models::Payment;

pub async fn create_pending<'e, E>(
    executor: E,
    user_id: i64,
    plan_id: i64,
    amount: i64,
    gateway: &str,
    description: &str,
) -> Result<Payment, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO payments (user_id, plan_id, amount, gateway, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, subscription_id, plan_id, amount, gateway, status,
                      authority, ref_id, card_mask, description, created_at, paid_at
        "#,
    )
    .bind(user_id)
    .bind(plan_id)
    .bind(amount)
    .bind(gateway)
    .bind(description)
    .fetch_one(executor)
    .await
}

/// Attach the gateway's checkout token once the checkout has been created.
pub async fn set_authority<'e, E>(
    executor: E,
    payment_id: i64,
    authority: &str,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE payments SET authority = $2 WHERE id = $1
        "#,
    )
    .bind(payment_id)
    .bind(authority)
    .execute(executor)
    .await?;
    Ok(())
}

/// Look up a payment by its gateway token, taking a row lock so concurrent
/// callback deliveries serialize on the status transition. Must run inside a
/// transaction.
pub async fn lock_by_authority(
    conn: &mut PgConnection,
    authority: &str,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, subscription_id, plan_id, amount, gateway, status,
                   authority, ref_id, card_mask, description, created_at, paid_at
            FROM payments
            WHERE authority = $1
            FOR UPDATE
        "#,
    )
    .bind(authority)
    .fetch_optional(conn)
    .await
}

pub async fn mark_paid<'e, E>(
    executor: E,
    payment_id: i64,
    ref_id: &str,
    card_mask: Option<&str>,
    subscription_id: i64,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE payments
            SET status = 'paid',
                ref_id = $2,
                card_mask = $3,
                subscription_id = $4,
                paid_at = NOW()
            WHERE id = $1
        "#,
    )
    .bind(payment_id)
    .bind(ref_id)
    .bind(card_mask)
    .bind(subscription_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn mark_failed<'e, E>(executor: E, payment_id: i64) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE payments SET status = 'failed' WHERE id = $1
        "#,
    )
    .bind(payment_id)
    .execute(executor)
    .await?;
    Ok(())
}

/// A user's own payment record.
pub async fn get_for_user<'e, E>(
    executor: E,
    payment_id: i64,
    user_id: i64,
) -> Result<Option<Payment>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, user_id, subscription_id, plan_id, amount, gateway, status,
                   authority, ref_id, card_mask, description, created_at, paid_at
            FROM payments
            WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(payment_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Cancel payments that never came back from the gateway. Run periodically.
pub async fn cancel_stale_pending<'e, E>(
    executor: E,
    older_than_hours: i32,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE payments
            SET status = 'cancelled'
            WHERE status = 'pending'
              AND created_at < NOW() - make_interval(hours => $1)
        "#,
    )
    .bind(older_than_hours)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
