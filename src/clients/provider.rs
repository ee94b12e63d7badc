use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct InitializeRequest {
    /// Amount in minor currency units (kobo), as the gateway expects.
    pub amount: i64,
    pub email: String,
    pub callback_url: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSession {
    pub reference: String,
    pub authorization_url: String,
}

/// Payment gateway capability, injected into the workflow engine so tests
/// can substitute a double.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn initialize(&self, request: &InitializeRequest) -> Result<ProviderSession, AppError>;

    /// True only when the provider reports the transaction as settled.
    async fn verify(&self, reference: &str) -> Result<bool, AppError>;
}

/// Major-unit decimal price to minor units; None when the price does not
/// fit a whole number of minor units.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let minor = amount * Decimal::from(100);
    if minor.fract() != Decimal::ZERO {
        return None;
    }
    minor.to_i64()
}

#[derive(Deserialize)]
struct GatewayEnvelope<T> {
    #[allow(dead_code)]
    status: bool,
    data: Option<T>,
}

#[derive(Deserialize)]
struct VerifyData {
    status: String,
}

/// Paystack-compatible HTTP client. Bearer-authenticated JSON API with a
/// bounded request timeout supplied by the shared `reqwest::Client`.
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackClient {
    pub fn new(http: reqwest::Client, base_url: String, secret_key: String) -> Self {
        Self {
            http,
            base_url,
            secret_key,
        }
    }

    fn transport_error(e: reqwest::Error) -> AppError {
        AppError::ProviderUnavailable(e.to_string())
    }
}

#[async_trait]
impl PaymentProvider for PaystackClient {
    async fn initialize(&self, request: &InitializeRequest) -> Result<ProviderSession, AppError> {
        let response = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(request)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderRejected(format!(
                "initialize returned {status}: {body}"
            )));
        }

        let envelope: GatewayEnvelope<ProviderSession> =
            response.json().await.map_err(Self::transport_error)?;
        envelope.data.ok_or_else(|| {
            AppError::ProviderRejected("initialize response carried no data".to_string())
        })
    }

    async fn verify(&self, reference: &str) -> Result<bool, AppError> {
        let response = self
            .http
            .get(format!("{}/transaction/verify/{reference}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VerificationFailed(format!(
                "verify returned {status}: {body}"
            )));
        }

        let envelope: GatewayEnvelope<VerifyData> =
            response.json().await.map_err(Self::transport_error)?;
        Ok(envelope
            .data
            .map(|data| data.status == "success")
            .unwrap_or(false))
    }
}
