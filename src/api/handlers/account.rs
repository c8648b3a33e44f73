//! Caller-scoped handlers: account overview, inbox and the public contact
//! form.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{Message, MessageId};
use crate::error::{ApiError, ErrorResponse};
use crate::service::account_service::AccountOverview;
use crate::service::message_service::ContactRequest;

/// `GET /me` — Caller's account overview.
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "Account",
    summary = "Account overview",
    description = "Stores or refreshes the caller's user record from the token claims and returns it with the profile, registrations and unread message count.",
    responses(
        (status = 200, description = "Account overview", body = AccountOverview),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    Json(state.accounts.overview(&auth).await)
}

/// `GET /me/messages` — Caller's inbox.
#[utoipa::path(
    get,
    path = "/api/v1/me/messages",
    tag = "Account",
    summary = "Inbox",
    description = "Announcements and direct messages addressed to the caller, newest first. Archived messages are left out.",
    responses(
        (status = 200, description = "Messages", body = Vec<Message>),
    ),
    security(("bearer" = []))
)]
pub async fn inbox(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    Json(state.messages.inbox(&auth).await)
}

/// `POST /me/messages/{id}/read` — Mark a direct message read.
///
/// # Errors
///
/// Returns [`ApiError`] for messages the caller cannot see or
/// announcements.
#[utoipa::path(
    post,
    path = "/api/v1/me/messages/{id}/read",
    tag = "Account",
    summary = "Mark a message read",
    params(
        ("id" = uuid::Uuid, Path, description = "Message UUID"),
    ),
    responses(
        (status = 200, description = "Updated message", body = Message),
        (status = 404, description = "Message not found", body = ErrorResponse),
        (status = 409, description = "Announcements have no read state", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .messages
        .mark_read(&auth, MessageId::from_uuid(id))
        .await?;
    Ok(Json(message))
}

/// `POST /contact` — Contact form.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] for missing fields.
#[utoipa::path(
    post,
    path = "/api/v1/contact",
    tag = "Account",
    summary = "Send a contact message",
    description = "Stores the message in the admin inbox. A token is optional; when present the sender is linked to the account.",
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Message stored", body = Message),
        (status = 400, description = "Invalid message", body = ErrorResponse),
    )
)]
pub async fn contact(
    State(state): State<AppState>,
    sender: Option<AuthUser>,
    Json(input): Json<ContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.messages.contact(sender.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Account routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/messages", get(inbox))
        .route("/me/messages/{id}/read", post(mark_read))
        .route("/contact", post(contact))
}
