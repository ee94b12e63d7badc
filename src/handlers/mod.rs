pub mod admin;
pub mod auth;
pub mod movies;
pub mod payments;
pub mod settings;

use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::utils::response::success;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "premiere-api",
    };

    success(payload, "Health check successful").into_response()
}
