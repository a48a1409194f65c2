use sqlx::{Executor, Postgres};

use crate::models::Notification;

/// Notifications visible to a user: their own plus unexpired broadcasts.
pub async fn list_for_user<'e, E>(
    executor: E,
    user_id: i64,
) -> Result<Vec<Notification>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, recipient_id, is_broadcast, title, message, kind,
                   is_read, created_at, read_at, expires_at
            FROM notifications
            WHERE (recipient_id = $1 OR is_broadcast)
              AND (expires_at IS NULL OR expires_at > NOW())
            ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Mark one of the user's own notifications read. Broadcasts have no
/// per-user read state, so only targeted rows match.
pub async fn mark_read<'e, E>(
    executor: E,
    notification_id: i64,
    user_id: i64,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW()
            WHERE id = $1 AND recipient_id = $2
        "#,
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Create a notification; `recipient_id = None` makes it a broadcast.
pub async fn create<'e, E>(
    executor: E,
    recipient_id: Option<i64>,
    title: &str,
    message: &str,
    kind: &str,
) -> Result<Notification, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO notifications (recipient_id, is_broadcast, title, message, kind)
            VALUES ($1, $1 IS NULL, $2, $3, $4)
            RETURNING id, recipient_id, is_broadcast, title, message, kind,
                      is_read, created_at, read_at, expires_at
        "#,
    )
    .bind(recipient_id)
    .bind(title)
    .bind(message)
    .bind(kind)
    .fetch_one(executor)
    .await
}
