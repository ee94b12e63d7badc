use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const TOKEN_LENGTH: usize = 7;
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Regular,
    Vip,
}

impl TicketType {
    /// Human-facing label used in notification copy.
    pub fn label(&self) -> &'static str {
        match self {
            TicketType::Regular => "Regular",
            TicketType::Vip => "VIP",
        }
    }
}

impl FromStr for TicketType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(TicketType::Regular),
            "vip" => Ok(TicketType::Vip),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketType::Regular => write!(f, "regular"),
            TicketType::Vip => write!(f, "vip"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    /// None for complimentary admin-issued tickets.
    pub payment_id: Option<Uuid>,
    pub token: String,
    pub ticket_type: TicketType,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    /// Random 7-character uppercase-alphanumeric access code. Global
    /// uniqueness is enforced by the unique index at insert time, with the
    /// ledger regenerating on collision.
    pub fn generate_token() -> String {
        let mut rng = rand::thread_rng();
        (0..TOKEN_LENGTH)
            .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn token_has_expected_shape() {
        for _ in 0..100 {
            let token = Ticket::generate_token();
            assert_eq!(token.len(), TOKEN_LENGTH);
            assert!(token
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn tokens_are_unique_with_regeneration() {
        // Mirrors the ledger's collision handling: regenerate until the
        // token is unseen.
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let mut token = Ticket::generate_token();
            while !seen.insert(token.clone()) {
                token = Ticket::generate_token();
            }
        }
        assert_eq!(seen.len(), 10_000);
    }

    #[test]
    fn ticket_type_parses_and_displays() {
        assert_eq!("regular".parse::<TicketType>(), Ok(TicketType::Regular));
        assert_eq!("vip".parse::<TicketType>(), Ok(TicketType::Vip));
        assert!("premium".parse::<TicketType>().is_err());
        assert_eq!(TicketType::Vip.to_string(), "vip");
        assert_eq!(TicketType::Vip.label(), "VIP");
    }
}
