use validator::Validate;

use crate::error::ApiError;

/// Notification kinds accepted by the admin endpoint.
const VALID_NOTIFICATION_KINDS: &[&str] = &["info", "success", "warning", "error", "announcement"];

/// Run `validator` derive checks and fold the field errors into a single
/// 400-level message.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload
        .validate()
        .map_err(|errors| ApiError::Validation(errors.to_string()))
}

/// Validate a notification kind against the known set.
pub fn validate_notification_kind(kind: &str) -> Result<(), ApiError> {
    if kind.is_empty() {
        return Err(ApiError::Validation(
            "notification kind cannot be empty".to_string(),
        ));
    }

    let normalized = kind.to_lowercase();
    if !VALID_NOTIFICATION_KINDS.contains(&normalized.as_str()) {
        return Err(ApiError::Validation(format!(
            "invalid notification kind: '{kind}'. Must be one of: {}",
            VALID_NOTIFICATION_KINDS.join(", ")
        )));
    }

    Ok(())
}
