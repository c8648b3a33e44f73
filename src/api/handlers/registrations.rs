//! Registration handlers: sign-up, own registrations, tickets and payment
//! start.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{Registration, RegistrationId, Ticket};
use crate::error::{ApiError, ErrorResponse};
use crate::service::payment_service::{BankTransferReceipt, BankTransferRequest, CheckoutSession};
use crate::service::registration_service::{
    CreateRegistration, RegistrationDetail, RegistrationReceipt,
};

/// `POST /registrations` — Register for an event.
///
/// # Errors
///
/// Returns [`ApiError`] when the event is closed, full, private or the
/// caller already holds an active registration.
#[utoipa::path(
    post,
    path = "/api/v1/registrations",
    tag = "Registrations",
    summary = "Register for an event",
    description = "Creates a PENDING registration with its payment record. Free events are confirmed immediately and the ticket is returned.",
    request_body = CreateRegistration,
    responses(
        (status = 201, description = "Registration created", body = RegistrationReceipt),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Already registered", body = ErrorResponse),
        (status = 422, description = "Registration closed or event full", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create_registration(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<CreateRegistration>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.registrations.create(&auth, input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `GET /registrations/me` — Caller's registrations.
#[utoipa::path(
    get,
    path = "/api/v1/registrations/me",
    tag = "Registrations",
    summary = "List own registrations",
    responses(
        (status = 200, description = "Registrations, newest first", body = Vec<RegistrationDetail>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn my_registrations(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    Json(state.registrations.list_mine(&auth).await)
}

/// `GET /registrations/{id}` — One registration.
///
/// # Errors
///
/// Returns [`ApiError`] for unknown registrations or foreign ones.
#[utoipa::path(
    get,
    path = "/api/v1/registrations/{id}",
    tag = "Registrations",
    summary = "Get a registration",
    params(
        ("id" = uuid::Uuid, Path, description = "Registration UUID"),
    ),
    responses(
        (status = 200, description = "Registration detail", body = RegistrationDetail),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Registration not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_registration(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state
        .registrations
        .get(&auth, RegistrationId::from_uuid(id))
        .await?;
    Ok(Json(detail))
}

/// `POST /registrations/{id}/cancel` — Cancel a registration.
///
/// # Errors
///
/// Returns [`ApiError`] when the registration is already closed or the
/// event starts too soon for an owner cancellation.
#[utoipa::path(
    post,
    path = "/api/v1/registrations/{id}/cancel",
    tag = "Registrations",
    summary = "Cancel a registration",
    description = "Owners may cancel a PENDING registration until 24 hours before the event; admins at any time.",
    params(
        ("id" = uuid::Uuid, Path, description = "Registration UUID"),
    ),
    responses(
        (status = 200, description = "Cancelled registration", body = Registration),
        (status = 409, description = "Registration cannot be cancelled", body = ErrorResponse),
        (status = 422, description = "Too close to the event", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn cancel_registration(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = state
        .registrations
        .cancel(&auth, RegistrationId::from_uuid(id))
        .await?;
    Ok(Json(registration))
}

/// `GET /registrations/{id}/ticket` — Badge of a confirmed registration.
///
/// # Errors
///
/// Returns [`ApiError::TicketNotFound`] until the registration is
/// confirmed.
#[utoipa::path(
    get,
    path = "/api/v1/registrations/{id}/ticket",
    tag = "Registrations",
    summary = "Get the ticket",
    description = "Returns the ticket with its signed QR payload.",
    params(
        ("id" = uuid::Uuid, Path, description = "Registration UUID"),
    ),
    responses(
        (status = 200, description = "Ticket", body = Ticket),
        (status = 404, description = "No ticket issued yet", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_ticket(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let ticket = state
        .registrations
        .ticket(&auth, RegistrationId::from_uuid(id))
        .await?;
    Ok(Json(ticket))
}

/// `POST /registrations/{id}/pay` — Start a card checkout.
///
/// # Errors
///
/// Returns [`ApiError`] when card payments are off, the registration is
/// not payable or the gateway fails.
#[utoipa::path(
    post,
    path = "/api/v1/registrations/{id}/pay",
    tag = "Payments",
    summary = "Start card checkout",
    description = "Initializes a hosted checkout with the card gateway and returns the URL the payer is sent to.",
    params(
        ("id" = uuid::Uuid, Path, description = "Registration UUID"),
    ),
    responses(
        (status = 200, description = "Checkout session", body = CheckoutSession),
        (status = 409, description = "Registration is not payable", body = ErrorResponse),
        (status = 502, description = "Gateway error", body = ErrorResponse),
        (status = 503, description = "Card payments not configured", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .payments
        .initialize(&auth, RegistrationId::from_uuid(id))
        .await?;
    Ok(Json(session))
}

/// `POST /registrations/{id}/bank-transfer` — Declare a bank transfer.
///
/// # Errors
///
/// Returns [`ApiError`] for invalid details or a registration that is not
/// payable.
#[utoipa::path(
    post,
    path = "/api/v1/registrations/{id}/bank-transfer",
    tag = "Payments",
    summary = "Declare a bank transfer",
    description = "Records the payer's transfer details; the payment waits for admin verification.",
    params(
        ("id" = uuid::Uuid, Path, description = "Registration UUID"),
    ),
    request_body = BankTransferRequest,
    responses(
        (status = 200, description = "Transfer recorded", body = BankTransferReceipt),
        (status = 400, description = "Invalid details", body = ErrorResponse),
        (status = 409, description = "Registration is not payable", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn declare_bank_transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(input): Json<BankTransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state
        .payments
        .bank_transfer(&auth, RegistrationId::from_uuid(id), input)
        .await?;
    Ok(Json(receipt))
}

/// Registration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/registrations", post(create_registration))
        .route("/registrations/me", get(my_registrations))
        .route("/registrations/{id}", get(get_registration))
        .route("/registrations/{id}/cancel", post(cancel_registration))
        .route("/registrations/{id}/ticket", get(get_ticket))
        .route("/registrations/{id}/pay", post(start_checkout))
        .route("/registrations/{id}/bank-transfer", post(declare_bank_transfer))
}
