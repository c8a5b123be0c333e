use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{error, warn};

use super::{claims::Identity, jwt::TokenService};
use crate::error::AppError;

/// Extracts and validates the bearer token, yielding the caller's identity.
pub struct AuthUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Bearer token not found"))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                warn!("invalid authorization scheme");
                AppError::unauthorized("Bearer token not found")
            })?;

        let claims = TokenService::from_ref(state).verify(token)?;

        if claims.user_id <= 0 {
            error!(user_id = claims.user_id, "token carries an impossible user id");
            return Err(AppError::internal("could not extract user id from claims"));
        }

        Ok(AuthUser(Identity {
            user_id: claims.user_id,
            email: claims.email,
        }))
    }
}
