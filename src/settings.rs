//! Mutable key-value configuration backing VIP pricing and capacity.

use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::info;

use crate::models::setting::{
    Setting, DEFAULT_VIP_LIMIT, DEFAULT_VIP_PRICE, VIP_LIMIT_KEY, VIP_PRICE_KEY,
};
use crate::utils::error::AppError;

/// Insert the default VIP price and limit when missing. Idempotent:
/// existing values are never overwritten.
pub async fn seed_defaults(pool: &PgPool) -> Result<(), AppError> {
    let inserted = sqlx::query(
        "INSERT INTO settings (key, value) VALUES ($1, $2), ($3, $4)
         ON CONFLICT (key) DO NOTHING",
    )
    .bind(VIP_PRICE_KEY)
    .bind(DEFAULT_VIP_PRICE)
    .bind(VIP_LIMIT_KEY)
    .bind(DEFAULT_VIP_LIMIT)
    .execute(pool)
    .await?;

    if inserted.rows_affected() > 0 {
        info!(rows = inserted.rows_affected(), "Seeded default settings");
    }
    Ok(())
}

pub async fn fetch(pool: &PgPool, key: &str) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Setting '{key}' not found")))
}

pub async fn fetch_all(pool: &PgPool) -> Result<Vec<Setting>, AppError> {
    Ok(
        sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY key")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn vip_price(pool: &PgPool) -> Result<Decimal, AppError> {
    let raw = fetch(pool, VIP_PRICE_KEY).await?;
    Decimal::from_str(&raw)
        .map_err(|_| AppError::InternalServerError(format!("Malformed vip_price setting: {raw}")))
}

pub async fn vip_limit(pool: &PgPool) -> Result<i64, AppError> {
    let raw = fetch(pool, VIP_LIMIT_KEY).await?;
    raw.parse::<i64>()
        .map_err(|_| AppError::InternalServerError(format!("Malformed vip_limit setting: {raw}")))
}

pub fn validate_vip_price(value: Decimal) -> Result<String, AppError> {
    if value <= Decimal::ZERO {
        return Err(AppError::ValidationError(
            "VIP price must be positive".to_string(),
        ));
    }
    Ok(value.to_string())
}

pub fn validate_vip_limit(value: i64) -> Result<String, AppError> {
    if value < 0 {
        return Err(AppError::ValidationError(
            "VIP limit must be non-negative".to_string(),
        ));
    }
    Ok(value.to_string())
}

/// Update one or both VIP settings; at least one is required. Changes only
/// affect future payments — recorded amounts are snapshots.
pub async fn update(
    pool: &PgPool,
    vip_price: Option<Decimal>,
    vip_limit: Option<i64>,
) -> Result<(), AppError> {
    if vip_price.is_none() && vip_limit.is_none() {
        return Err(AppError::ValidationError(
            "At least one setting (vip_price or vip_limit) required".to_string(),
        ));
    }

    if let Some(price) = vip_price {
        let value = validate_vip_price(price)?;
        set(pool, VIP_PRICE_KEY, &value).await?;
    }
    if let Some(limit) = vip_limit {
        let value = validate_vip_limit(limit)?;
        set(pool, VIP_LIMIT_KEY, &value).await?;
    }
    Ok(())
}

async fn set(pool: &PgPool, key: &str, value: &str) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES ($1, $2)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    info!(%key, %value, "Setting updated");
    Ok(())
}
