//! Payment-to-ticket issuance workflow: initialize with the provider,
//! verify, settle through the ledger, then notify best-effort.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::hash_password;
use crate::clients::{InitializeRequest, Notifier, PaymentProvider};
use crate::clients::provider::to_minor_units;
use crate::ledger;
use crate::models::{Movie, TicketType, User};
use crate::settings;
use crate::utils::error::AppError;
use crate::utils::validate::{is_valid_email, is_valid_phone, split_list};

#[derive(Debug, Deserialize)]
pub struct InitializePurchase {
    pub movie_id: Uuid,
    pub email: String,
    pub ticket_type: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct VerifiedTicket {
    pub ticket_token: String,
    pub ticket_type: TicketType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    Email,
    WhatsApp,
}

impl FromStr for DeliveryMethod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(DeliveryMethod::Email),
            "whatsapp" => Ok(DeliveryMethod::WhatsApp),
            _ => Err(AppError::ValidationError(
                "Invalid method: must be email or whatsapp".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendVipTicket {
    pub movie_id: Uuid,
    pub recipient: String,
    pub phone: String,
    pub method: String,
}

#[derive(Debug, Deserialize)]
pub struct SendReminderBatch {
    pub movie_id: Uuid,
    pub recipients: String,
    pub phones: String,
    pub method: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub delivered: usize,
    #[serde(skip)]
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct IssuedVipTicket {
    pub ticket_token: String,
    pub method: String,
}

pub struct PaymentWorkflow {
    pool: PgPool,
    provider: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn Notifier>,
    frontend_url: String,
}

impl PaymentWorkflow {
    pub fn new(
        pool: PgPool,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn Notifier>,
        frontend_url: String,
    ) -> Self {
        Self {
            pool,
            provider,
            notifier,
            frontend_url,
        }
    }

    /// Start a purchase: resolve the price, enforce VIP capacity, open a
    /// provider session and record the pending payment under the
    /// provider's reference.
    pub async fn initialize(
        &self,
        user_id: Uuid,
        request: InitializePurchase,
    ) -> Result<CheckoutSession, AppError> {
        let ticket_type = TicketType::from_str(&request.ticket_type).map_err(|_| {
            AppError::ValidationError("Invalid ticket_type: must be regular or vip".to_string())
        })?;

        let user = fetch_user(&self.pool, user_id).await?;
        if user.email != request.email {
            return Err(AppError::Forbidden(
                "Email does not match the authenticated user".to_string(),
            ));
        }

        let movie = fetch_movie(&self.pool, request.movie_id).await?;

        let amount = match ticket_type {
            TicketType::Regular => movie.price,
            TicketType::Vip => {
                let limit = settings::vip_limit(&self.pool).await?;
                // Only settled payments count; pending purchases hold no
                // slot, so concurrent buyers near the ceiling can oversell.
                let settled = ledger::count_settled_vip_payments(&self.pool, movie.id).await?;
                if settled >= limit {
                    return Err(AppError::CapacityExceeded("VIP tickets sold out".to_string()));
                }
                settings::vip_price(&self.pool).await?
            }
        };

        let amount_minor = to_minor_units(amount).ok_or_else(|| {
            AppError::InternalServerError(format!("Amount {amount} has sub-minor precision"))
        })?;

        let session = self
            .provider
            .initialize(&InitializeRequest {
                amount: amount_minor,
                email: user.email.clone(),
                callback_url: format!("{}/payment-status", self.frontend_url),
                metadata: json!({
                    "movie_id": movie.id,
                    "user_id": user.id,
                    "ticket_type": ticket_type,
                }),
            })
            .await?;

        ledger::create_pending_payment(
            &self.pool,
            user.id,
            movie.id,
            ticket_type,
            amount,
            &session.reference,
        )
        .await?;

        info!(reference = %session.reference, %ticket_type, "Payment initialized");
        Ok(CheckoutSession {
            authorization_url: session.authorization_url,
            reference: session.reference,
        })
    }

    /// Confirm settlement with the provider and issue the ticket.
    /// Idempotent: a reference that already settled returns its existing
    /// ticket and sends no second notification. A provider failure leaves
    /// the payment pending and retryable.
    pub async fn verify(
        &self,
        reference: &str,
        requesting_user: Option<Uuid>,
    ) -> Result<VerifiedTicket, AppError> {
        let payment = ledger::find_payment_by_reference(&self.pool, reference)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if let Some(user_id) = requesting_user {
            if payment.user_id != user_id {
                return Err(AppError::Forbidden(
                    "Unauthorized access to payment".to_string(),
                ));
            }
        }

        let settled = self.provider.verify(reference).await?;
        if !settled {
            return Err(AppError::VerificationFailed(format!(
                "Provider reports reference '{reference}' as unsettled"
            )));
        }

        let settlement = ledger::settle_payment(&self.pool, payment.id).await?;

        if settlement.newly_issued {
            let movie = fetch_movie(&self.pool, payment.movie_id).await?;
            let user = fetch_user(&self.pool, payment.user_id).await?;
            self.dispatch_ticket_notifications(
                user,
                movie,
                payment.ticket_type,
                settlement.ticket.token.clone(),
            );
        }

        Ok(VerifiedTicket {
            ticket_token: settlement.ticket.token,
            ticket_type: payment.ticket_type,
        })
    }

    /// Complimentary VIP issuance: find or create the recipient's account,
    /// issue under the capacity ceiling, then notify via the chosen
    /// channel.
    pub async fn send_vip_ticket(&self, request: SendVipTicket) -> Result<IssuedVipTicket, AppError> {
        let method = DeliveryMethod::from_str(&request.method)?;
        let movie = fetch_movie(&self.pool, request.movie_id).await?;

        let recipient = request.recipient.trim().to_string();
        let phone = request.phone.trim().to_string();
        if method == DeliveryMethod::Email && !is_valid_email(&recipient) {
            return Err(AppError::ValidationError(format!(
                "Invalid email format: {recipient}"
            )));
        }
        if !is_valid_phone(&phone) {
            return Err(AppError::ValidationError(format!(
                "Invalid phone format: {phone}"
            )));
        }

        let target = match method {
            DeliveryMethod::Email => self.find_or_create_by_email(&recipient, &phone).await?,
            DeliveryMethod::WhatsApp => self.find_or_create_by_phone(&phone).await?,
        };

        let limit = settings::vip_limit(&self.pool).await?;
        let ticket =
            ledger::issue_complimentary_vip_ticket(&self.pool, target.id, movie.id, limit).await?;

        // Delivery is best-effort; the issued ticket stands either way.
        let outcome = match method {
            DeliveryMethod::Email => {
                let (subject, html) = vip_ticket_email(&movie, &ticket.token);
                self.notifier.send_email(&recipient, &subject, &html).await
            }
            DeliveryMethod::WhatsApp => {
                self.notifier
                    .send_whatsapp(&phone, &vip_ticket_whatsapp(&movie, &ticket.token), &[])
                    .await
            }
        };
        if let Err(e) = outcome {
            warn!(error = %e, token = %ticket.token, "VIP ticket notification failed");
        }

        Ok(IssuedVipTicket {
            ticket_token: ticket.token,
            method: request.method,
        })
    }

    /// Promotional/reminder fan-out. Contact formats are validated up
    /// front; delivery failures are collected per recipient instead of
    /// aborting the batch.
    pub async fn send_reminder_batch(
        &self,
        request: SendReminderBatch,
    ) -> Result<BatchOutcome, AppError> {
        let method = DeliveryMethod::from_str(&request.method)?;
        let movie = fetch_movie(&self.pool, request.movie_id).await?;

        let recipients = split_list(&request.recipients);
        let phones = split_list(&request.phones);
        if recipients.len() != phones.len() {
            return Err(AppError::ValidationError(
                "Number of recipients and phone numbers must match".to_string(),
            ));
        }

        if method == DeliveryMethod::Email {
            for recipient in &recipients {
                if !is_valid_email(recipient) {
                    return Err(AppError::ValidationError(format!(
                        "Invalid email format: {recipient}"
                    )));
                }
            }
        }
        for phone in &phones {
            if !is_valid_phone(phone) {
                return Err(AppError::ValidationError(format!(
                    "Invalid phone format: {phone}"
                )));
            }
        }

        let mut errors = Vec::new();
        let mut delivered = 0usize;

        match method {
            DeliveryMethod::Email => {
                let (subject, html) = reminder_email(&movie, &request.message);
                for recipient in &recipients {
                    match self.notifier.send_email(recipient, &subject, &html).await {
                        Ok(()) => delivered += 1,
                        Err(e) => errors.push(format!("Delivery to {recipient} failed: {e}")),
                    }
                }
            }
            DeliveryMethod::WhatsApp => {
                let body = reminder_whatsapp(&movie, &request.message);
                for phone in &phones {
                    match self.notifier.send_whatsapp(phone, &body, &[]).await {
                        Ok(()) => delivered += 1,
                        Err(e) => errors.push(format!("Delivery to {phone} failed: {e}")),
                    }
                }
            }
        }

        Ok(BatchOutcome { delivered, errors })
    }

    /// Fire-and-forget: runs after the settlement transaction commits and
    /// only ever logs its failures.
    fn dispatch_ticket_notifications(
        &self,
        user: User,
        movie: Movie,
        ticket_type: TicketType,
        token: String,
    ) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let (subject, html) = purchase_email(&user.email, &movie, ticket_type, &token);
            if let Err(e) = notifier.send_email(&user.email, &subject, &html).await {
                warn!(error = %e, email = %user.email, "Ticket email failed");
            }

            let body = purchase_whatsapp(&user.email, &movie, ticket_type, &token);
            if let Err(e) = notifier.send_whatsapp(&user.phone, &body, &[]).await {
                warn!(error = %e, phone = %user.phone, "Ticket WhatsApp message failed");
            }
        });
    }

    async fn find_or_create_by_email(&self, email: &str, phone: &str) -> Result<User, AppError> {
        let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        match existing {
            Some(user) => Ok(user),
            None => self.create_guest(email, phone).await,
        }
    }

    async fn find_or_create_by_phone(&self, phone: &str) -> Result<User, AppError> {
        let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        match existing {
            Some(user) => Ok(user),
            None => {
                let email = format!("vip_{}@guests.invalid", random_string(12).to_lowercase());
                self.create_guest(&email, phone).await
            }
        }
    }

    async fn create_guest(&self, email: &str, phone: &str) -> Result<User, AppError> {
        let password_hash = hash_password(&random_string(16))?;
        let user = ledger::insert_user(&self.pool, email, phone, &password_hash).await?;
        info!(%email, "Created guest account for complimentary ticket");
        Ok(user)
    }
}

async fn fetch_user(pool: &PgPool, user_id: Uuid) -> Result<User, AppError> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Unknown user".to_string()))
}

async fn fetch_movie(pool: &PgPool, movie_id: Uuid) -> Result<Movie, AppError> {
    sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = $1")
        .bind(movie_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Movie not found".to_string()))
}

fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn poster_data_uri(movie: &Movie) -> Option<String> {
    movie
        .poster
        .as_ref()
        .map(|bytes| format!("data:image/jpeg;base64,{}", BASE64.encode(bytes)))
}

fn poster_img_tag(movie: &Movie) -> String {
    poster_data_uri(movie)
        .map(|uri| format!(r#"<br><img src="{uri}" alt="Movie Poster" style="max-width: 100%; height: auto;">"#))
        .unwrap_or_default()
}

fn purchase_email(
    user_email: &str,
    movie: &Movie,
    ticket_type: TicketType,
    token: &str,
) -> (String, String) {
    let label = ticket_type.label();
    let subject = format!("{label} Ticket for {}", movie.title);
    let html = format!(
        "Dear {user_email},<br><br>\
         Thank you for purchasing a {label} ticket to the premiere of \"{title}\".<br><br>\
         Your access code is: <b>{token}</b><br><br>\
         Date: {date}<br><br>\
         Please arrive 30 minutes before the screening for smooth entry and seating.\
         {poster}",
        title = movie.title,
        date = movie.premiere_date,
        poster = poster_img_tag(movie),
    );
    (subject, html)
}

fn purchase_whatsapp(
    user_email: &str,
    movie: &Movie,
    ticket_type: TicketType,
    token: &str,
) -> String {
    format!(
        "Dear {user_email},\n\n\
         Thank you for purchasing a {label} ticket to the premiere of \"{title}\".\n\n\
         Your access code: {token}\n\
         Date: {date}\n\n\
         Arrive 30 minutes early for smooth entry.",
        label = ticket_type.label(),
        title = movie.title,
        date = movie.premiere_date,
    )
}

fn vip_ticket_email(movie: &Movie, token: &str) -> (String, String) {
    let subject = format!("VIP Ticket for {}", movie.title);
    let html = format!(
        "Your VIP ticket token: <b>{token}</b><br>Movie: {title}<br>Date: {date}{poster}",
        title = movie.title,
        date = movie.premiere_date,
        poster = poster_img_tag(movie),
    );
    (subject, html)
}

fn vip_ticket_whatsapp(movie: &Movie, token: &str) -> String {
    format!(
        "VIP Ticket\nEvent: {title}\nDate: {date}\nYour ticket token: {token}",
        title = movie.title,
        date = movie.premiere_date,
    )
}

fn reminder_email(movie: &Movie, message: &str) -> (String, String) {
    let subject = format!("Reminder: {}", movie.title);
    let html = format!(
        "{message}<br>Movie: {title}<br>Date: {date}{poster}",
        title = movie.title,
        date = movie.premiere_date,
        poster = poster_img_tag(movie),
    );
    (subject, html)
}

fn reminder_whatsapp(movie: &Movie, message: &str) -> String {
    format!(
        "Reminder: {message}\nEvent: {title}\nDate: {date}",
        title = movie.title,
        date = movie.premiere_date,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn sample_movie(poster: Option<Vec<u8>>) -> Movie {
        Movie {
            id: Uuid::new_v4(),
            title: "Premiere X".to_string(),
            premiere_date: NaiveDate::from_ymd_opt(2026, 9, 12).unwrap(),
            poster,
            price: Decimal::from(13_000),
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn delivery_method_parses() {
        assert_eq!(
            DeliveryMethod::from_str("email").unwrap(),
            DeliveryMethod::Email
        );
        assert_eq!(
            DeliveryMethod::from_str("whatsapp").unwrap(),
            DeliveryMethod::WhatsApp
        );
        assert!(matches!(
            DeliveryMethod::from_str("carrier-pigeon"),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn purchase_email_carries_token_and_label() {
        let movie = sample_movie(None);
        let (subject, html) = purchase_email("fan@example.com", &movie, TicketType::Vip, "AB12CD3");
        assert_eq!(subject, "VIP Ticket for Premiere X");
        assert!(html.contains("AB12CD3"));
        assert!(html.contains("VIP ticket"));
        assert!(html.contains("2026-09-12"));
        assert!(!html.contains("img src"));
    }

    #[test]
    fn poster_is_embedded_as_data_uri() {
        let movie = sample_movie(Some(vec![0xFF, 0xD8, 0xFF]));
        let uri = poster_data_uri(&movie).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));

        let (_, html) = vip_ticket_email(&movie, "AB12CD3");
        assert!(html.contains("data:image/jpeg;base64,"));
    }

    #[test]
    fn whatsapp_bodies_carry_the_token() {
        let movie = sample_movie(None);
        assert!(vip_ticket_whatsapp(&movie, "Z9Y8X7W").contains("Z9Y8X7W"));
        assert!(
            purchase_whatsapp("fan@example.com", &movie, TicketType::Regular, "Z9Y8X7W")
                .contains("Regular ticket")
        );
    }

    #[test]
    fn reminder_bodies_carry_the_message() {
        let movie = sample_movie(None);
        let (subject, html) = reminder_email(&movie, "Doors open at 6pm");
        assert_eq!(subject, "Reminder: Premiere X");
        assert!(html.contains("Doors open at 6pm"));
        assert!(reminder_whatsapp(&movie, "Doors open at 6pm").contains("Doors open at 6pm"));
    }

    #[test]
    fn random_strings_are_alphanumeric() {
        let s = random_string(16);
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    use crate::clients::ProviderSession;
    use async_trait::async_trait;
    use sqlx::PgPool;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway double: every session settles, references are sequential.
    struct StubGateway {
        sequence: AtomicUsize,
    }

    #[async_trait]
    impl PaymentProvider for StubGateway {
        async fn initialize(
            &self,
            _request: &InitializeRequest,
        ) -> Result<ProviderSession, AppError> {
            let n = self.sequence.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderSession {
                reference: format!("ref-{n:04}"),
                authorization_url: format!("https://checkout.example.com/ref-{n:04}"),
            })
        }

        async fn verify(&self, _reference: &str) -> Result<bool, AppError> {
            Ok(true)
        }
    }

    struct SilentNotifier;

    #[async_trait]
    impl Notifier for SilentNotifier {
        async fn send_email(&self, _: &str, _: &str, _: &str) -> Result<(), AppError> {
            Ok(())
        }

        async fn send_whatsapp(&self, _: &str, _: &str, _: &[String]) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn stub_workflow(pool: &PgPool) -> PaymentWorkflow {
        PaymentWorkflow::new(
            pool.clone(),
            Arc::new(StubGateway {
                sequence: AtomicUsize::new(0),
            }),
            Arc::new(SilentNotifier),
            "https://premiere.example.com".to_string(),
        )
    }

    async fn seed_db_movie(pool: &PgPool) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO movies (title, premiere_date, price) VALUES ('Premiere X', $1, 13000.00)
             RETURNING id",
        )
        .bind(NaiveDate::from_ymd_opt(2026, 9, 12).unwrap())
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn verify_returns_the_same_ticket_for_a_settled_reference(pool: PgPool) {
        crate::settings::seed_defaults(&pool).await.unwrap();
        let movie = seed_db_movie(&pool).await;
        let user = ledger::insert_user(&pool, "fan@example.com", "+2348012345678", "x")
            .await
            .unwrap();
        let workflow = stub_workflow(&pool);

        let session = workflow
            .initialize(
                user.id,
                InitializePurchase {
                    movie_id: movie,
                    email: "fan@example.com".to_string(),
                    ticket_type: "regular".to_string(),
                },
            )
            .await
            .unwrap();

        let first = workflow.verify(&session.reference, Some(user.id)).await.unwrap();
        let second = workflow.verify(&session.reference, Some(user.id)).await.unwrap();
        assert_eq!(first.ticket_token, second.ticket_token);
    }

    #[sqlx::test]
    async fn third_vip_purchase_hits_the_capacity_ceiling(pool: PgPool) {
        crate::settings::seed_defaults(&pool).await.unwrap();
        crate::settings::update(&pool, None, Some(2)).await.unwrap();
        let movie = seed_db_movie(&pool).await;
        let workflow = stub_workflow(&pool);

        for i in 0..2 {
            let email = format!("fan{i}@example.com");
            let phone = format!("+234801234567{i}");
            let user = ledger::insert_user(&pool, &email, &phone, "x").await.unwrap();
            let session = workflow
                .initialize(
                    user.id,
                    InitializePurchase {
                        movie_id: movie,
                        email,
                        ticket_type: "vip".to_string(),
                    },
                )
                .await
                .unwrap();
            workflow.verify(&session.reference, Some(user.id)).await.unwrap();
        }

        let late = ledger::insert_user(&pool, "late@example.com", "+2348099999999", "x")
            .await
            .unwrap();
        let err = workflow
            .initialize(
                late.id,
                InitializePurchase {
                    movie_id: movie,
                    email: "late@example.com".to_string(),
                    ticket_type: "vip".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));
    }

    #[sqlx::test]
    async fn vip_send_with_a_taken_phone_is_a_validation_error(pool: PgPool) {
        crate::settings::seed_defaults(&pool).await.unwrap();
        let movie = seed_db_movie(&pool).await;
        ledger::insert_user(&pool, "owner@example.com", "+2348012345678", "x")
            .await
            .unwrap();
        let workflow = stub_workflow(&pool);

        let err = workflow
            .send_vip_ticket(SendVipTicket {
                movie_id: movie,
                recipient: "new-guest@example.com".to_string(),
                phone: "+2348012345678".to_string(),
                method: "email".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("Phone")));
    }
}
