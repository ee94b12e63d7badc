use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::utils::error::AppError;

/// Outbound notification capability. Both channels are best-effort: the
/// workflow logs failures and never lets them affect ticket issuance.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError>;

    async fn send_whatsapp(
        &self,
        to: &str,
        body: &str,
        media_urls: &[String],
    ) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub api_key: String,
    pub from_email: String,
}

#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

/// SendGrid-style mail API plus Twilio-style WhatsApp API over HTTP.
/// Unconfigured channels log and skip, so a bare deployment still issues
/// tickets.
pub struct HttpNotifier {
    http: reqwest::Client,
    mailer: Option<MailerConfig>,
    whatsapp: Option<WhatsAppConfig>,
}

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

impl HttpNotifier {
    pub fn new(
        http: reqwest::Client,
        mailer: Option<MailerConfig>,
        whatsapp: Option<WhatsAppConfig>,
    ) -> Self {
        Self {
            http,
            mailer,
            whatsapp,
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_email(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let Some(mailer) = &self.mailer else {
            info!(%to, "Mailer not configured, skipping email");
            return Ok(());
        };

        let payload = json!({
            "personalizations": [{"to": [{"email": to}]}],
            "from": {"email": mailer.from_email},
            "subject": subject,
            "content": [{"type": "text/html", "value": html_body}],
        });

        let response = self
            .http
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&mailer.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::NotifierError(format!("mail transport: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NotifierError(format!(
                "mail API returned {status}: {body}"
            )));
        }

        info!(%to, "Email dispatched");
        Ok(())
    }

    async fn send_whatsapp(
        &self,
        to: &str,
        body: &str,
        media_urls: &[String],
    ) -> Result<(), AppError> {
        let Some(whatsapp) = &self.whatsapp else {
            info!(%to, "WhatsApp channel not configured, skipping message");
            return Ok(());
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            whatsapp.account_sid
        );

        let mut form = vec![
            ("From".to_string(), whatsapp.from_number.clone()),
            ("To".to_string(), format!("whatsapp:{to}")),
            ("Body".to_string(), body.to_string()),
        ];
        for media_url in media_urls {
            form.push(("MediaUrl".to_string(), media_url.clone()));
        }

        let response = self
            .http
            .post(url)
            .basic_auth(&whatsapp.account_sid, Some(&whatsapp.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::NotifierError(format!("whatsapp transport: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::NotifierError(format!(
                "whatsapp API returned {status}: {body}"
            )));
        }

        info!(%to, "WhatsApp message dispatched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unconfigured channels must not fail: ticket issuance proceeds on a
    // bare deployment.
    #[tokio::test]
    async fn unconfigured_channels_skip_quietly() {
        let notifier = HttpNotifier::new(reqwest::Client::new(), None, None);
        assert!(notifier
            .send_email("fan@example.com", "Subject", "<p>Body</p>")
            .await
            .is_ok());
        assert!(notifier
            .send_whatsapp("+2348012345678", "Body", &[])
            .await
            .is_ok());
    }
}
