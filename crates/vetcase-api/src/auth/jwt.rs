use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const TOKEN_LIFETIME_HOURS: i64 = 24;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a string
    pub sub: String,
    pub email: String,
    /// Staff users bypass the subscription gate and may administer content
    #[serde(default)]
    pub staff: bool,
    pub exp: usize,
    pub iat: usize,
}

/// Generate a signed JWT for a user.
pub fn generate_token(
    user_id: i64,
    email: String,
    staff: bool,
    jwt_secret: &str,
) -> Result<String, ApiError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email,
        staff,
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Auth(format!("failed to sign token: {e}")))
}

/// Verify and decode a JWT.
pub fn verify_token(token: &str, jwt_secret: &str) -> Result<Claims, ApiError> {
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Auth("Invalid or expired token".to_string()))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_jwt_secret_minimum_32_characters_long";

    #[test]
    fn test_generate_and_verify_token() {
        let token = generate_token(42, "student@example.com".to_string(), false, SECRET)
            .expect("Failed to generate token");
        assert!(!token.is_empty());

        let claims = verify_token(&token, SECRET).expect("Failed to verify token");
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "student@example.com");
        assert!(!claims.staff);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_staff_flag_round_trips() {
        let token = generate_token(1, "admin@example.com".to_string(), true, SECRET)
            .expect("Failed to generate token");
        let claims = verify_token(&token, SECRET).expect("Failed to verify token");
        assert!(claims.staff);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = generate_token(42, "student@example.com".to_string(), false, SECRET)
            .expect("Failed to generate token");
        let result = verify_token(&token, "wrong_jwt_secret_minimum_32_characters");
        assert!(matches!(result, Err(ApiError::Auth(_))));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(matches!(
            verify_token("not.a.token", SECRET),
            Err(ApiError::Auth(_))
        ));
    }
}
