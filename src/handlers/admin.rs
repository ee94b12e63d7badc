use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::ledger;
use crate::models::{Movie, Payment, Ticket, TicketType, User};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, partial_success, success};
use crate::workflow::{SendReminderBatch, SendVipTicket};

#[derive(Serialize)]
struct UserDetail {
    #[serde(flatten)]
    user: User,
    payments: Vec<Payment>,
    tickets: Vec<Ticket>,
}

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Response, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at")
        .fetch_all(&state.pool)
        .await?;

    let mut details = Vec::with_capacity(users.len());
    for user in users {
        let payments = ledger::list_payments_for_user(&state.pool, user.id).await?;
        let tickets = ledger::list_tickets_for_user(&state.pool, user.id).await?;
        details.push(UserDetail {
            user,
            payments,
            tickets,
        });
    }

    Ok(success(details, "Registered users").into_response())
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Response, AppError> {
    if admin.id == user_id {
        return Err(AppError::Forbidden("Cannot delete own account".to_string()));
    }
    if !ledger::purge_user(&state.pool, user_id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(empty_success("User deleted").into_response())
}

pub async fn list_tickets(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Response, AppError> {
    let tickets = ledger::list_tickets(&state.pool).await?;
    Ok(success(tickets, "Issued tickets").into_response())
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    if !ledger::delete_ticket(&state.pool, ticket_id).await? {
        return Err(AppError::NotFound("Ticket not found".to_string()));
    }
    Ok(empty_success("Ticket deleted").into_response())
}

#[derive(Deserialize)]
pub struct VerifyTicketRequest {
    pub token: String,
}

#[derive(Serialize)]
struct TicketVerification {
    valid: bool,
    user_email: String,
    user_phone: String,
    movie_title: String,
    premiere_date: NaiveDate,
    issued_at: DateTime<Utc>,
    ticket_type: TicketType,
}

/// Door check: resolve an access code to its holder and movie.
pub async fn verify_ticket_token(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<VerifyTicketRequest>,
) -> Result<Response, AppError> {
    let ticket = ledger::find_ticket_by_token(&state.pool, request.token.trim())
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid token".to_string()))?;

    let holder = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(ticket.user_id)
        .fetch_one(&state.pool)
        .await?;
    let movie = sqlx::query_as::<_, Movie>("SELECT * FROM movies WHERE id = $1")
        .bind(ticket.movie_id)
        .fetch_one(&state.pool)
        .await?;

    Ok(success(
        TicketVerification {
            valid: true,
            user_email: holder.email,
            user_phone: holder.phone,
            movie_title: movie.title,
            premiere_date: movie.premiere_date,
            issued_at: ticket.created_at,
            ticket_type: ticket.ticket_type,
        },
        "Ticket token is valid",
    )
    .into_response())
}

pub async fn send_vip_ticket(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<SendVipTicket>,
) -> Result<Response, AppError> {
    let issued = state.workflow.send_vip_ticket(request).await?;
    let message = format!("VIP ticket sent via {}", issued.method);
    Ok(success(issued, message).into_response())
}

pub async fn send_reminder(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<SendReminderBatch>,
) -> Result<Response, AppError> {
    let outcome = state.workflow.send_reminder_batch(request).await?;
    let message = if outcome.errors.is_empty() {
        "Reminder messages sent"
    } else {
        "Some reminder messages failed"
    };
    let errors = outcome.errors.clone();
    Ok(partial_success(json!({"delivered": outcome.delivered}), message, errors).into_response())
}
