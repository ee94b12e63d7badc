use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::jwt::Claims;
use crate::models::User;
use crate::state::AppState;
use crate::utils::error::AppError;

/// Authenticated caller; verified claims only, no database round trip.
pub struct AuthUser(pub Claims);

/// Caller that may or may not be authenticated. Used by payment
/// verification, where anonymous webhook-style calls are permitted.
pub struct MaybeAuthUser(pub Option<Claims>);

/// Authenticated caller whose user row carries the admin flag. Re-checked
/// against the database so revoking the flag takes effect immediately.
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::AuthError("Missing or invalid token".to_string()))?;
        let claims = state.jwt.verify(token)?;
        Ok(AuthUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let claims = bearer_token(parts).and_then(|token| state.jwt.verify(token).ok());
        Ok(MaybeAuthUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(claims.sub)
            .fetch_optional(&state.pool)
            .await?
            .ok_or_else(|| AppError::AuthError("Unknown user".to_string()))?;

        if !user.is_admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(AdminUser(user))
    }
}
