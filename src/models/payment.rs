use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::ticket::TicketType;

/// Lifecycle of a payment. There is deliberately no failed state: a payment
/// the provider never settles stays pending and may be re-verified later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    /// Price snapshot taken at initialization; later setting changes do not
    /// alter it.
    pub amount: Decimal,
    pub provider_ref: String,
    pub status: PaymentStatus,
    pub ticket_type: TicketType,
    pub created_at: DateTime<Utc>,
}
