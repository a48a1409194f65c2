//! Background jobs for periodic maintenance tasks.
//!
//! Subscription expiry is deliberately handled lazily at read time, so there
//! is no sweeper for it. What does need a periodic pass: rate limiter windows
//! that nobody touches again, and payments whose gateway callback never
//! arrived.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::time::interval;

use vetcase_db::repositories::payment as payment_repo;

use crate::middleware::rate_limit::RateLimiter;

/// Payments still pending after this long are considered abandoned.
const STALE_PAYMENT_HOURS: i32 = 24;

/// Start all background jobs
///
/// Returns a vector of join handles that can be awaited on shutdown
pub fn start_background_jobs(
    pool: PgPool,
    rate_limiter: Arc<RateLimiter>,
) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        tokio::spawn(rate_limiter_prune_job(rate_limiter)),
        tokio::spawn(stale_payment_cleanup_job(pool)),
    ]
}

/// Prune idle rate limiter windows every five minutes.
async fn rate_limiter_prune_job(rate_limiter: Arc<RateLimiter>) {
    let mut interval = interval(Duration::from_secs(300));

    loop {
        interval.tick().await;

        let pruned = rate_limiter.prune();
        if pruned > 0 {
            tracing::debug!("Pruned {} idle rate limit windows", pruned);
        }
    }
}

/// Cancel payments abandoned mid-checkout, once a day.
async fn stale_payment_cleanup_job(pool: PgPool) {
    // Wait an hour before the first run to avoid startup contention
    tokio::time::sleep(Duration::from_secs(3600)).await;

    let mut interval = interval(Duration::from_secs(86400));

    loop {
        interval.tick().await;

        match payment_repo::cancel_stale_pending(&pool, STALE_PAYMENT_HOURS).await {
            Ok(cancelled) if cancelled > 0 => {
                tracing::info!("Cancelled {} stale pending payments", cancelled);
            }
            Ok(_) => {
                tracing::debug!("No stale pending payments found");
            }
            Err(e) => {
                tracing::error!("Failed to cancel stale pending payments: {}", e);
            }
        }
    }
}
