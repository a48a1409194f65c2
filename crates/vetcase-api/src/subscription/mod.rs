pub mod model;
pub mod routes;

pub use routes::routes;

use sqlx::PgPool;

use vetcase_db::repositories::subscription as subscription_repo;

use crate::{auth::AuthUser, error::ApiError};

/// Gate for catalog reads: staff pass through, everyone else needs an active
/// subscription. Runs the lazy expiry correction first so a stale `active`
/// row is persisted as `expired` before it is judged.
pub async fn require_active(pool: &PgPool, user: &AuthUser) -> Result<(), ApiError> {
    if user.staff {
        return Ok(());
    }

    subscription_repo::expire_if_lapsed(pool, user.user_id).await?;

    if subscription_repo::has_active(pool, user.user_id).await? {
        Ok(())
    } else {
        Err(ApiError::SubscriptionRequired)
    }
}
