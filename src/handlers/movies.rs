use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::ledger;
use crate::models::setting::VIP_PRICE_KEY;
use crate::models::Movie;
use crate::settings;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

const MAX_POSTER_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_POSTER_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Regular price applied when the admin form omits one.
const DEFAULT_REGULAR_PRICE: Decimal = Decimal::from_parts(1_300_000, 0, 0, false, 2);

#[derive(Serialize)]
struct MovieListing {
    id: Uuid,
    title: String,
    premiere_date: NaiveDate,
    poster: Option<String>,
    regular_price: String,
    vip_price: String,
}

async fn catalog(state: &AppState) -> Result<Vec<MovieListing>, AppError> {
    let movies = sqlx::query_as::<_, Movie>("SELECT * FROM movies ORDER BY premiere_date")
        .fetch_all(&state.pool)
        .await?;
    let vip_price = settings::fetch(&state.pool, VIP_PRICE_KEY).await?;

    Ok(movies
        .into_iter()
        .map(|movie| MovieListing {
            id: movie.id,
            title: movie.title,
            premiere_date: movie.premiere_date,
            poster: movie.poster.as_deref().map(|bytes| BASE64.encode(bytes)),
            regular_price: movie.price.to_string(),
            vip_price: vip_price.clone(),
        })
        .collect())
}

pub async fn list_movies(State(state): State<AppState>) -> Result<Response, AppError> {
    let listing = catalog(&state).await?;
    Ok(success(listing, "Movie catalog").into_response())
}

pub async fn admin_list_movies(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Response, AppError> {
    let listing = catalog(&state).await?;
    Ok(success(listing, "Movie catalog").into_response())
}

pub async fn get_movie_image(
    State(state): State<AppState>,
    Path(movie_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let poster = sqlx::query_scalar::<_, Option<Vec<u8>>>(
        "SELECT poster FROM movies WHERE id = $1",
    )
    .bind(movie_id)
    .fetch_optional(&state.pool)
    .await?
    .flatten()
    .ok_or_else(|| AppError::NotFound("Image not found".to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], poster).into_response())
}

pub async fn create_movie(
    State(state): State<AppState>,
    _admin: AdminUser,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut title: Option<String> = None;
    let mut premiere_date: Option<NaiveDate> = None;
    let mut price: Option<Decimal> = None;
    let mut poster: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => {
                title = Some(read_text(field).await?);
            }
            "premiere_date" => {
                let raw = read_text(field).await?;
                premiere_date = Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(
                    |e| AppError::ValidationError(format!("Invalid premiere_date format: {e}")),
                )?);
            }
            "price" => {
                let raw = read_text(field).await?;
                price = Some(Decimal::from_str(&raw).map_err(|_| {
                    AppError::ValidationError(format!("Invalid price: {raw}"))
                })?);
            }
            "poster" => {
                let filename = field.file_name().unwrap_or_default().to_lowercase();
                let allowed = filename
                    .rsplit_once('.')
                    .map(|(_, ext)| ALLOWED_POSTER_EXTENSIONS.contains(&ext))
                    .unwrap_or(false);
                if !allowed {
                    return Err(AppError::ValidationError(
                        "Invalid file type. Allowed: png, jpg, jpeg, gif".to_string(),
                    ));
                }
                let bytes = field.bytes().await.map_err(|e| {
                    AppError::ValidationError(format!("Failed to read poster: {e}"))
                })?;
                if bytes.len() > MAX_POSTER_BYTES {
                    return Err(AppError::ValidationError(
                        "File too large. Max 5MB".to_string(),
                    ));
                }
                poster = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let title = title.filter(|t| !t.trim().is_empty()).ok_or_else(|| {
        AppError::ValidationError("Missing required field: title".to_string())
    })?;
    let premiere_date = premiere_date.ok_or_else(|| {
        AppError::ValidationError("Missing required field: premiere_date".to_string())
    })?;
    let price = price.unwrap_or(DEFAULT_REGULAR_PRICE);
    if price <= Decimal::ZERO {
        return Err(AppError::ValidationError("Price must be positive".to_string()));
    }

    let movie = sqlx::query_as::<_, Movie>(
        "INSERT INTO movies (title, premiere_date, poster, price) VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(&title)
    .bind(premiere_date)
    .bind(poster)
    .bind(price)
    .fetch_one(&state.pool)
    .await?;

    Ok(created(json!({"id": movie.id}), "Movie added").into_response())
}

pub async fn delete_movie(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(movie_id): Path<Uuid>,
) -> Result<Response, AppError> {
    if !ledger::purge_movie(&state.pool, movie_id).await? {
        return Err(AppError::NotFound("Movie not found".to_string()));
    }
    Ok(empty_success("Movie deleted").into_response())
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::ValidationError(format!("Malformed multipart field: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_regular_price_is_13000() {
        assert_eq!(DEFAULT_REGULAR_PRICE.to_string(), "13000.00");
    }
}
