use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a lab test group attached to a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lab_test_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LabTestKind {
    Cbc,
    Chem,
    Morpho,
    Other,
    Slide,
}

/// Subscription duration class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Monthly,
    Quarterly,
    Yearly,
    Lifetime,
}

impl SubscriptionKind {
    /// Nominal duration in days; `None` for unlimited access.
    pub const fn duration_days(self) -> Option<i64> {
        match self {
            Self::Monthly => Some(30),
            Self::Quarterly => Some(90),
            Self::Yearly => Some(365),
            Self::Lifetime => None,
        }
    }
}

/// Subscription lifecycle state.
///
/// `pending -> active -> expired`; `active -> cancelled`;
/// `pending -> cancelled`. Re-activation is the only way out of
/// `expired`/`cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Cancelled,
}

/// Payment lifecycle state. A payment transitions out of `pending` exactly
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Refunded,
}

/// Category tag for cases; optionally nested one level via `parent_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CaseCategory {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// One clinical scenario presented to a student.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Case {
    pub id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    /// Patient history shown before any results
    pub history: String,
    /// Reference diagnosis the student's free text is compared against
    pub correct_diagnosis: String,
    /// Explanation revealed after submission
    pub explanation: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One category of lab results (CBC, chemistry, morphology, ...) for a case.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LabTestGroup {
    pub id: i64,
    pub case_id: i64,
    pub kind: LabTestKind,
    pub name: String,
    pub normal_range: String,
    pub result_text: String,
    pub position: i32,
}

/// One selectable statement within a lab test group. The set of options
/// flagged `is_correct` is the group's answer key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ObservationOption {
    pub id: i64,
    pub lab_test_group_id: i64,
    pub text: String,
    pub is_correct: bool,
    pub position: i32,
}

/// Histology slide attached to a case. The image itself lives in external
/// storage; only the path is recorded here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Slide {
    pub id: i64,
    pub case_id: i64,
    pub image_path: String,
    pub description: String,
    pub position: i32,
}

/// Per (user, case) progress record. Created lazily on first view, then
/// overwritten on each submission; only `attempts` accumulates.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProgress {
    pub id: i64,
    pub user_id: i64,
    pub case_id: i64,
    pub completed: bool,
    pub correct_observations: i32,
    pub total_observations: i32,
    /// Accuracy percentage of the latest submission
    pub score: f64,
    pub attempts: i32,
    pub diagnosis_text: String,
    pub is_diagnosis_correct: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only log entry of a single observation pick.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserObservation {
    pub id: i64,
    pub user_id: i64,
    pub case_id: i64,
    pub lab_test_group_id: Option<i64>,
    pub observation_text: String,
    pub is_correct: bool,
    pub selected_at: DateTime<Utc>,
}

/// Aggregate per-user statistics, recomputed from `user_progress` after each
/// submission.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfileStats {
    pub user_id: i64,
    pub total_cases_completed: i32,
    pub total_correct_observations: i32,
    pub total_observations: i32,
    pub total_correct_diagnoses: i32,
    pub total_diagnoses: i32,
    pub average_attempts_per_case: f64,
    pub updated_at: DateTime<Utc>,
}

impl UserProfileStats {
    /// Empty stats row for users who have not completed anything yet.
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            total_cases_completed: 0,
            total_correct_observations: 0,
            total_observations: 0,
            total_correct_diagnoses: 0,
            total_diagnoses: 0,
            average_attempts_per_case: 0.0,
            updated_at: Utc::now(),
        }
    }
}

/// A purchasable subscription plan shown on the pricing page.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionPlan {
    pub id: i64,
    pub name: String,
    pub kind: SubscriptionKind,
    /// `None` for lifetime plans
    pub duration_days: Option<i32>,
    /// Price in whole currency units
    pub price: i64,
    pub discount_percent: i32,
    pub is_active: bool,
    pub is_popular: bool,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionPlan {
    /// Price after the plan's discount.
    pub fn final_price(&self) -> i64 {
        self.price - self.price * i64::from(self.discount_percent) / 100
    }
}

/// Per-user subscription record gating catalog access.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub kind: SubscriptionKind,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    /// `None` means unlimited
    pub end_date: Option<DateTime<Utc>>,
    pub price: i64,
    pub auto_renew: bool,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Whether the subscription grants access at `now`.
    ///
    /// A row whose `end_date` has passed is no longer active even before the
    /// lazy status correction has been persisted.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && !self.lapsed_at(now)
    }

    /// Whether the row still says `active` but the end date has passed, so a
    /// read should persist the `expired` correction.
    pub fn lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.end_date.is_some_and(|end| end < now)
    }

    /// Days of access left at `now`; `None` for unlimited subscriptions.
    pub fn days_remaining_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.end_date.map(|end| (end - now).num_days().max(0))
    }
}

/// End date after extending by `days` at `now`: a still-running subscription
/// extends from its current end, a lapsed or never-dated one restarts from
/// `now`. Unlimited subscriptions stay unlimited.
pub fn extended_end(
    current_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    days: i64,
) -> Option<DateTime<Utc>> {
    match current_end {
        None => None,
        Some(end) if end > now => Some(end + Duration::days(days)),
        Some(_) => Some(now + Duration::days(days)),
    }
}

/// A payment attempt against the gateway. Created `pending` before the
/// redirect; transitioned exactly once by the callback.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub subscription_id: Option<i64>,
    pub plan_id: Option<i64>,
    pub amount: i64,
    pub gateway: String,
    pub status: PaymentStatus,
    /// Gateway reference token issued at checkout
    pub authority: Option<String>,
    /// Gateway transaction reference, set when paid
    pub ref_id: Option<String>,
    pub card_mask: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Fields required to create a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCase {
    pub category_id: Option<i64>,
    pub title: String,
    pub history: String,
    pub correct_diagnosis: String,
    pub explanation: String,
    pub published: bool,
}

/// One row of a bulk case import. Optional fields let malformed rows be
/// detected and skipped instead of failing the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseImportRow {
    pub title: Option<String>,
    pub history: Option<String>,
    pub correct_diagnosis: Option<String>,
    pub explanation: Option<String>,
}

impl CaseImportRow {
    /// The trimmed required fields, or `None` if any is missing or blank.
    pub fn required_fields(&self) -> Option<(String, String, String, String)> {
        let field = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };
        Some((
            field(&self.title)?,
            field(&self.history)?,
            field(&self.correct_diagnosis)?,
            field(&self.explanation)?,
        ))
    }
}

/// Notification addressed to one user or broadcast to everyone.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub recipient_id: Option<i64>,
    pub is_broadcast: bool,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}
