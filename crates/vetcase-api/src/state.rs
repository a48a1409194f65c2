use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use vetcase_grading::DiagnosisMatcher;

use crate::config::{ApiConfig, Environment};
use crate::middleware::rate_limit::{RateLimitConfig, RateLimiter};
use crate::payment::gateway::{PaymentGateway, SandboxGateway, ZarinpalGateway};

#[derive(Clone)]
pub struct ApiState {
    pub pool: PgPool,
    pub jwt_secret: String,
    pub environment: Environment,
    pub gateway: Arc<dyn PaymentGateway>,
    pub callback_base_url: String,
    pub diagnosis_matcher: DiagnosisMatcher,
    pub rate_limiter: Arc<RateLimiter>,
}

impl ApiState {
    pub fn new(config: &ApiConfig, pool: PgPool) -> Self {
        // Pick the real gateway only when a merchant id is configured; the
        // sandbox gateway keeps local checkouts working without credentials.
        let gateway: Arc<dyn PaymentGateway> = match &config.zarinpal_merchant_id {
            Some(merchant_id) => Arc::new(ZarinpalGateway::new(
                merchant_id.clone(),
                config.zarinpal_sandbox,
            )),
            None => {
                tracing::warn!(
                    "ZARINPAL_MERCHANT_ID not configured, using the sandbox payment gateway"
                );
                Arc::new(SandboxGateway::new())
            }
        };

        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            max_requests: config.rate_limit_max_requests,
            window: Duration::from_secs(config.rate_limit_window_seconds),
        }));

        Self {
            pool,
            jwt_secret: config.jwt_secret.clone(),
            environment: config.env,
            gateway,
            callback_base_url: config.callback_base_url.clone(),
            diagnosis_matcher: config.diagnosis_matcher,
            rate_limiter,
        }
    }
}
