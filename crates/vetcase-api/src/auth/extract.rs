use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};

use super::jwt::verify_token;
use crate::{error::ApiError, state::ApiState};

/// Authenticated user extractor.
///
/// Validates the bearer token from the `Authorization` header. Use this in
/// route handlers to require authentication.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub staff: bool,
}

impl<S> FromRequestParts<S> for AuthUser
where
    ApiState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = ApiState::from_ref(state);

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Auth("Not authenticated".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Auth("Expected a bearer token".to_string()))?;

        let claims = verify_token(token, &state.jwt_secret)?;

        let user_id = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Auth("Invalid user ID in token".to_string()))?;

        Ok(Self {
            user_id,
            email: claims.email,
            staff: claims.staff,
        })
    }
}

/// Staff-only extractor for the admin surface.
#[derive(Debug, Clone)]
pub struct StaffUser(pub AuthUser);

impl<S> FromRequestParts<S> for StaffUser
where
    ApiState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.staff {
            return Err(ApiError::Forbidden(
                "this operation requires staff access".to_string(),
            ));
        }
        Ok(Self(user))
    }
}
