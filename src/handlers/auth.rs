use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::ledger;
use crate::models::User;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};
use crate::utils::validate::{is_valid_email, is_valid_phone};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub is_admin: bool,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let email = request.email.trim().to_string();
    let phone = request.phone.trim().to_string();

    if !is_valid_email(&email) {
        return Err(AppError::ValidationError(format!(
            "Invalid email format: {email}"
        )));
    }
    if !is_valid_phone(&phone) {
        return Err(AppError::ValidationError(format!(
            "Invalid phone format: {phone}"
        )));
    }
    if request.password.is_empty() {
        return Err(AppError::ValidationError(
            "Password must not be empty".to_string(),
        ));
    }

    let email_taken =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind(&email)
            .fetch_one(&state.pool)
            .await?;
    if email_taken > 0 {
        return Err(AppError::ValidationError("Email already exists".to_string()));
    }

    let phone_taken =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE phone = $1")
            .bind(&phone)
            .fetch_one(&state.pool)
            .await?;
    if phone_taken > 0 {
        return Err(AppError::ValidationError("Phone already exists".to_string()));
    }

    // The COUNT checks give friendly errors; the insert itself still maps
    // unique violations, so a concurrent duplicate loses cleanly.
    let password_hash = hash_password(&request.password)?;
    let user = ledger::insert_user(&state.pool, &email, &phone, &password_hash).await?;

    Ok(created(json!({"id": user.id}), "User created").into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(request.email.trim())
        .fetch_optional(&state.pool)
        .await?;

    let invalid = || AppError::AuthError("Invalid credentials".to_string());
    let user = user.ok_or_else(invalid)?;
    if !verify_password(&request.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = state.jwt.issue(&user)?;
    Ok(success(
        LoginResponse {
            token,
            is_admin: user.is_admin,
        },
        "Login successful",
    )
    .into_response())
}

pub async fn verify_token(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Response, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(claims.sub)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Unknown user".to_string()))?;

    Ok(success(
        json!({
            "id": user.id,
            "email": user.email,
            "is_admin": user.is_admin,
        }),
        "Token is valid",
    )
    .into_response())
}
