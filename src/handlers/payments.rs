use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;
use crate::workflow::InitializePurchase;

pub async fn initialize_payment(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(request): Json<InitializePurchase>,
) -> Result<Response, AppError> {
    let session = state.workflow.initialize(claims.sub, request).await?;
    Ok(success(session, "Payment initialized").into_response())
}

/// Idempotent settlement confirmation. Authentication is optional so the
/// provider's redirect (which carries no bearer token) can land here; when
/// a token is present the payment must belong to its user.
pub async fn verify_payment(
    State(state): State<AppState>,
    MaybeAuthUser(claims): MaybeAuthUser,
    Path(reference): Path<String>,
) -> Result<Response, AppError> {
    let verified = state
        .workflow
        .verify(&reference, claims.map(|c| c.sub))
        .await?;
    Ok(success(verified, "Payment verified").into_response())
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub reference: Option<String>,
}

/// Landing endpoint for the provider redirect; points the caller at the
/// frontend's payment-status page, which performs the actual verify.
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let reference = query
        .reference
        .ok_or_else(|| AppError::ValidationError("Missing reference".to_string()))?;

    let redirect = format!(
        "{}/payment-status?reference={reference}",
        state.frontend_url
    );
    Ok(success(json!({"redirect": redirect}), "Payment callback received").into_response())
}
