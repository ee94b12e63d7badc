use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub premiere_date: NaiveDate,
    #[serde(skip_serializing, default)]
    pub poster: Option<Vec<u8>>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}
