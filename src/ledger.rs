//! Payment and ticket lifecycle primitives. All Payment/Ticket mutation
//! goes through these transactional operations; nothing else touches the
//! rows directly.

use rust_decimal::Decimal;
use sqlx::{Acquire, PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

use crate::models::{Payment, PaymentStatus, Ticket, TicketType, User};
use crate::utils::error::AppError;

/// Collisions in a 36^7 token space are vanishingly rare; a handful of
/// regenerations is more than enough.
const TOKEN_INSERT_RETRIES: usize = 5;

const TOKEN_UNIQUE_CONSTRAINT: &str = "tickets_token_key";
const REFERENCE_UNIQUE_CONSTRAINT: &str = "payments_provider_ref_key";
const USER_EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";
const USER_PHONE_UNIQUE_CONSTRAINT: &str = "users_phone_key";

#[derive(Debug)]
pub struct Settlement {
    pub ticket: Ticket,
    /// False when the payment was already settled and the existing ticket
    /// is being returned idempotently.
    pub newly_issued: bool,
}

fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}

/// Create an account. Unique-contact violations come back as validation
/// errors, so a registration that loses a race with a concurrent duplicate
/// still reports the conflict rather than a server error.
pub async fn insert_user(
    pool: &PgPool,
    email: &str,
    phone: &str,
    password_hash: &str,
) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (email, phone, password_hash) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(email)
    .bind(phone)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if violates(&e, USER_EMAIL_UNIQUE_CONSTRAINT) {
            AppError::ValidationError(format!("Email '{email}' already exists"))
        } else if violates(&e, USER_PHONE_UNIQUE_CONSTRAINT) {
            AppError::ValidationError(format!("Phone '{phone}' already exists"))
        } else {
            e.into()
        }
    })
}

pub async fn create_pending_payment(
    pool: &PgPool,
    user_id: Uuid,
    movie_id: Uuid,
    ticket_type: TicketType,
    amount: Decimal,
    provider_ref: &str,
) -> Result<Payment, AppError> {
    sqlx::query_as::<_, Payment>(
        "INSERT INTO payments (user_id, movie_id, amount, provider_ref, status, ticket_type)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(user_id)
    .bind(movie_id)
    .bind(amount)
    .bind(provider_ref)
    .bind(PaymentStatus::Pending)
    .bind(ticket_type)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if violates(&e, REFERENCE_UNIQUE_CONSTRAINT) {
            AppError::DuplicateReference(format!("Reference '{provider_ref}' already recorded"))
        } else {
            e.into()
        }
    })
}

pub async fn find_payment_by_reference(
    pool: &PgPool,
    reference: &str,
) -> Result<Option<Payment>, AppError> {
    Ok(
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE provider_ref = $1")
            .bind(reference)
            .fetch_optional(pool)
            .await?,
    )
}

/// Successful VIP payments for a movie, the figure the initialize-time
/// capacity check counts. Pending payments hold no slot.
pub async fn count_settled_vip_payments(pool: &PgPool, movie_id: Uuid) -> Result<i64, AppError> {
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM payments
         WHERE movie_id = $1 AND ticket_type = $2 AND status = $3",
    )
    .bind(movie_id)
    .bind(TicketType::Vip)
    .bind(PaymentStatus::Success)
    .fetch_one(pool)
    .await?)
}

/// Settle a payment and issue its ticket as one atomic unit.
///
/// The payment row is locked for the duration, so concurrent verifies of
/// the same reference serialize here: exactly one caller issues the
/// ticket, every later caller gets the same ticket back with
/// `newly_issued = false`.
pub async fn settle_payment(pool: &PgPool, payment_id: Uuid) -> Result<Settlement, AppError> {
    let mut tx = pool.begin().await?;

    let payment =
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

    if payment.status == PaymentStatus::Success {
        let ticket =
            sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE payment_id = $1")
                .bind(payment.id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| {
                    AppError::InternalServerError(format!(
                        "Settled payment {} has no ticket",
                        payment.id
                    ))
                })?;
        tx.commit().await?;
        return Ok(Settlement {
            ticket,
            newly_issued: false,
        });
    }

    let ticket = insert_ticket(
        &mut tx,
        payment.user_id,
        payment.movie_id,
        Some(payment.id),
        payment.ticket_type,
    )
    .await?;

    sqlx::query("UPDATE payments SET status = $1 WHERE id = $2")
        .bind(PaymentStatus::Success)
        .bind(payment.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(Settlement {
        ticket,
        newly_issued: true,
    })
}

/// Direct VIP issuance with no backing payment, capacity-checked against
/// the VIP ticket count inside the same transaction.
pub async fn issue_complimentary_vip_ticket(
    pool: &PgPool,
    user_id: Uuid,
    movie_id: Uuid,
    vip_limit: i64,
) -> Result<Ticket, AppError> {
    let mut tx = pool.begin().await?;

    let issued = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM tickets WHERE movie_id = $1 AND ticket_type = $2",
    )
    .bind(movie_id)
    .bind(TicketType::Vip)
    .fetch_one(&mut *tx)
    .await?;

    if issued >= vip_limit {
        return Err(AppError::CapacityExceeded("VIP tickets sold out".to_string()));
    }

    let ticket = insert_ticket(&mut tx, user_id, movie_id, None, TicketType::Vip).await?;
    tx.commit().await?;
    Ok(ticket)
}

/// Insert a ticket, regenerating the token when the unique index reports a
/// collision. Each attempt runs in a savepoint so a violation does not
/// poison the outer transaction.
async fn insert_ticket(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    movie_id: Uuid,
    payment_id: Option<Uuid>,
    ticket_type: TicketType,
) -> Result<Ticket, AppError> {
    insert_ticket_with(
        tx,
        user_id,
        movie_id,
        payment_id,
        ticket_type,
        Ticket::generate_token,
    )
    .await
}

async fn insert_ticket_with(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    movie_id: Uuid,
    payment_id: Option<Uuid>,
    ticket_type: TicketType,
    mut next_token: impl FnMut() -> String + Send,
) -> Result<Ticket, AppError> {
    for _ in 0..TOKEN_INSERT_RETRIES {
        let token = next_token();
        let mut savepoint = tx.begin().await?;

        let inserted = sqlx::query_as::<_, Ticket>(
            "INSERT INTO tickets (user_id, movie_id, payment_id, token, ticket_type)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(user_id)
        .bind(movie_id)
        .bind(payment_id)
        .bind(&token)
        .bind(ticket_type)
        .fetch_one(&mut *savepoint)
        .await;

        match inserted {
            Ok(ticket) => {
                savepoint.commit().await?;
                return Ok(ticket);
            }
            Err(e) if violates(&e, TOKEN_UNIQUE_CONSTRAINT) => {
                savepoint.rollback().await?;
                warn!(%token, "Ticket token collision, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(AppError::TokenExhausted)
}

pub async fn find_ticket_by_token(pool: &PgPool, token: &str) -> Result<Option<Ticket>, AppError> {
    Ok(sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await?)
}

pub async fn list_tickets(pool: &PgPool) -> Result<Vec<Ticket>, AppError> {
    Ok(
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn list_tickets_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Ticket>, AppError> {
    Ok(
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(pool)
            .await?,
    )
}

pub async fn list_payments_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<Payment>, AppError> {
    Ok(sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE user_id = $1 ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn delete_ticket(pool: &PgPool, ticket_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
        .bind(ticket_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a movie together with its payments and tickets. The referential
/// cleanup happens before the movie row inside one transaction.
pub async fn purge_movie(pool: &PgPool, movie_id: Uuid) -> Result<bool, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM tickets WHERE movie_id = $1")
        .bind(movie_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM payments WHERE movie_id = $1")
        .bind(movie_id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM movies WHERE id = $1")
        .bind(movie_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(deleted.rows_affected() > 0)
}

/// Delete a user together with their payments and tickets.
pub async fn purge_user(pool: &PgPool, user_id: Uuid) -> Result<bool, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM tickets WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM payments WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(deleted.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn seed_user(pool: &PgPool, email: &str, phone: &str) -> Uuid {
        insert_user(pool, email, phone, "x").await.unwrap().id
    }

    async fn seed_movie(pool: &PgPool) -> Uuid {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO movies (title, premiere_date, price) VALUES ('Premiere X', $1, 13000.00)
             RETURNING id",
        )
        .bind(NaiveDate::from_ymd_opt(2026, 9, 12).unwrap())
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn seed_pending_payment(
        pool: &PgPool,
        user_id: Uuid,
        movie_id: Uuid,
        ticket_type: TicketType,
        reference: &str,
    ) -> Payment {
        create_pending_payment(
            pool,
            user_id,
            movie_id,
            ticket_type,
            Decimal::from(25_000),
            reference,
        )
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn settlement_is_idempotent(pool: PgPool) {
        let user = seed_user(&pool, "fan@example.com", "+2348012345678").await;
        let movie = seed_movie(&pool).await;
        let payment =
            seed_pending_payment(&pool, user, movie, TicketType::Vip, "ref-0001").await;

        let first = settle_payment(&pool, payment.id).await.unwrap();
        assert!(first.newly_issued);

        let second = settle_payment(&pool, payment.id).await.unwrap();
        assert!(!second.newly_issued);
        assert_eq!(second.ticket.id, first.ticket.id);
        assert_eq!(second.ticket.token, first.ticket.token);

        let issued: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE payment_id = $1")
                .bind(payment.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(issued, 1);
    }

    #[sqlx::test]
    async fn duplicate_provider_reference_is_rejected(pool: PgPool) {
        let user = seed_user(&pool, "fan@example.com", "+2348012345678").await;
        let movie = seed_movie(&pool).await;
        seed_pending_payment(&pool, user, movie, TicketType::Regular, "ref-0001").await;

        let err = create_pending_payment(
            &pool,
            user,
            movie,
            TicketType::Regular,
            Decimal::from(13_000),
            "ref-0001",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::DuplicateReference(_)));
    }

    #[sqlx::test]
    async fn settled_vip_count_ignores_pending_and_regular(pool: PgPool) {
        let user = seed_user(&pool, "fan@example.com", "+2348012345678").await;
        let movie = seed_movie(&pool).await;

        let vip = seed_pending_payment(&pool, user, movie, TicketType::Vip, "ref-vip").await;
        let regular =
            seed_pending_payment(&pool, user, movie, TicketType::Regular, "ref-reg").await;
        assert_eq!(count_settled_vip_payments(&pool, movie).await.unwrap(), 0);

        settle_payment(&pool, vip.id).await.unwrap();
        settle_payment(&pool, regular.id).await.unwrap();
        assert_eq!(count_settled_vip_payments(&pool, movie).await.unwrap(), 1);
    }

    #[sqlx::test]
    async fn complimentary_issuance_stops_at_the_vip_limit(pool: PgPool) {
        let user = seed_user(&pool, "fan@example.com", "+2348012345678").await;
        let movie = seed_movie(&pool).await;

        issue_complimentary_vip_ticket(&pool, user, movie, 2)
            .await
            .unwrap();
        issue_complimentary_vip_ticket(&pool, user, movie, 2)
            .await
            .unwrap();

        let err = issue_complimentary_vip_ticket(&pool, user, movie, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityExceeded(_)));

        let issued: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE movie_id = $1")
            .bind(movie)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(issued, 2);
    }

    #[sqlx::test]
    async fn token_collision_regenerates_within_the_transaction(pool: PgPool) {
        let user = seed_user(&pool, "fan@example.com", "+2348012345678").await;
        let movie = seed_movie(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        insert_ticket_with(&mut tx, user, movie, None, TicketType::Regular, || {
            "AAAAAAA".to_string()
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        // First draw collides with the existing token, the retry lands.
        let mut queue = vec!["BBBBBBB", "AAAAAAA"];
        let mut tx = pool.begin().await.unwrap();
        let ticket = insert_ticket_with(&mut tx, user, movie, None, TicketType::Regular, move || {
            queue.pop().unwrap().to_string()
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(ticket.token, "BBBBBBB");
    }

    #[sqlx::test]
    async fn token_exhaustion_is_reported(pool: PgPool) {
        let user = seed_user(&pool, "fan@example.com", "+2348012345678").await;
        let movie = seed_movie(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        insert_ticket_with(&mut tx, user, movie, None, TicketType::Regular, || {
            "AAAAAAA".to_string()
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let err = insert_ticket_with(&mut tx, user, movie, None, TicketType::Regular, || {
            "AAAAAAA".to_string()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::TokenExhausted));
    }

    #[sqlx::test]
    async fn purge_movie_removes_payments_and_tickets(pool: PgPool) {
        let user = seed_user(&pool, "fan@example.com", "+2348012345678").await;
        let movie = seed_movie(&pool).await;
        let payment =
            seed_pending_payment(&pool, user, movie, TicketType::Regular, "ref-0001").await;
        settle_payment(&pool, payment.id).await.unwrap();

        assert!(purge_movie(&pool, movie).await.unwrap());

        let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE movie_id = $1")
            .bind(movie)
            .fetch_one(&pool)
            .await
            .unwrap();
        let tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE movie_id = $1")
            .bind(movie)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((payments, tickets), (0, 0));

        assert!(!purge_movie(&pool, movie).await.unwrap());
    }

    #[sqlx::test]
    async fn purge_user_removes_payments_and_tickets(pool: PgPool) {
        let user = seed_user(&pool, "fan@example.com", "+2348012345678").await;
        let movie = seed_movie(&pool).await;
        let payment =
            seed_pending_payment(&pool, user, movie, TicketType::Vip, "ref-0001").await;
        settle_payment(&pool, payment.id).await.unwrap();

        assert!(purge_user(&pool, user).await.unwrap());

        let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user)
            .fetch_one(&pool)
            .await
            .unwrap();
        let tickets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE user_id = $1")
            .bind(user)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((payments, tickets), (0, 0));

        assert!(!purge_user(&pool, user).await.unwrap());
    }

    #[sqlx::test]
    async fn duplicate_user_contacts_are_validation_errors(pool: PgPool) {
        insert_user(&pool, "fan@example.com", "+2348012345678", "x")
            .await
            .unwrap();

        let err = insert_user(&pool, "fan@example.com", "+2348099999999", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("Email")));

        let err = insert_user(&pool, "other@example.com", "+2348012345678", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("Phone")));
    }
}
