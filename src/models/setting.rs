use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const VIP_PRICE_KEY: &str = "vip_price";
pub const VIP_LIMIT_KEY: &str = "vip_limit";

pub const DEFAULT_VIP_PRICE: &str = "25000.00";
pub const DEFAULT_VIP_LIMIT: &str = "50";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub id: Uuid,
    pub key: String,
    pub value: String,
}
