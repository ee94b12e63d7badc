use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::apply_security_headers;

use crate::clients::{MailerConfig, WhatsAppConfig};

const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_FRONTEND_URL: &str = "https://ohamsmovies.com.ng";

pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub paystack_base_url: String,
    pub paystack_secret_key: String,
    pub mailer: Option<MailerConfig>,
    pub whatsapp: Option<WhatsAppConfig>,
}

impl Config {
    /// Startup-only: panics on missing required variables, like the rest
    /// of the boot sequence.
    pub fn from_env() -> Self {
        let mailer = match (env::var("SENDGRID_API_KEY"), env::var("FROM_EMAIL")) {
            (Ok(api_key), Ok(from_email)) => Some(MailerConfig {
                api_key,
                from_email,
            }),
            _ => None,
        };

        let whatsapp = match (
            env::var("TWILIO_ACCOUNT_SID"),
            env::var("TWILIO_AUTH_TOKEN"),
            env::var("TWILIO_WHATSAPP_FROM"),
        ) {
            (Ok(account_sid), Ok(auth_token), Ok(from_number)) => Some(WhatsAppConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(5000),
            jwt_secret: env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            paystack_base_url: env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PAYSTACK_BASE_URL.to_string()),
            paystack_secret_key: env::var("PAYSTACK_SECRET_KEY")
                .expect("PAYSTACK_SECRET_KEY must be set"),
            mailer,
            whatsapp,
        }
    }
}
