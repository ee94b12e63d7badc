use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::auth::AdminUser;
use crate::settings;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

pub async fn get_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Response, AppError> {
    let mut map = Map::new();
    for setting in settings::fetch_all(&state.pool).await? {
        map.insert(setting.key, Value::String(setting.value));
    }
    Ok(success(Value::Object(map), "Current settings").into_response())
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub vip_price: Option<Decimal>,
    pub vip_limit: Option<i64>,
}

pub async fn update_settings(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Response, AppError> {
    settings::update(&state.pool, request.vip_price, request.vip_limit).await?;
    Ok(empty_success("Settings updated").into_response())
}
