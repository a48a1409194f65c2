use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use vetcase_db::models::{Subscription, SubscriptionKind, SubscriptionPlan, SubscriptionStatus};

/// Subscription as returned to its owner.
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub id: i64,
    pub kind: SubscriptionKind,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    /// `None` for unlimited subscriptions
    pub days_remaining: Option<i64>,
    pub auto_renew: bool,
}

pub fn subscription_view(subscription: &Subscription) -> SubscriptionView {
    SubscriptionView {
        id: subscription.id,
        kind: subscription.kind,
        status: subscription.status,
        start_date: subscription.start_date,
        end_date: subscription.end_date,
        days_remaining: subscription.days_remaining_at(Utc::now()),
        auto_renew: subscription.auto_renew,
    }
}

/// Plan as shown on the pricing page.
#[derive(Debug, Serialize)]
pub struct PlanView {
    pub id: i64,
    pub name: String,
    pub kind: SubscriptionKind,
    pub duration_days: Option<i32>,
    pub price: i64,
    pub discount_percent: i32,
    pub final_price: i64,
    pub is_popular: bool,
}

pub fn plan_view(plan: &SubscriptionPlan) -> PlanView {
    PlanView {
        id: plan.id,
        name: plan.name.clone(),
        kind: plan.kind,
        duration_days: plan.duration_days,
        price: plan.price,
        discount_percent: plan.discount_percent,
        final_price: plan.final_price(),
        is_popular: plan.is_popular,
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    #[serde(default)]
    pub kind: Option<SubscriptionKind>,
    /// Overrides the kind's nominal duration; `None` with a lifetime kind
    /// means unlimited
    #[serde(default)]
    pub duration_days: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ExtendRequest {
    #[validate(range(min = 1, max = 3650))]
    pub days: i32,
}
