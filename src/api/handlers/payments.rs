//! Payment handlers: reference verification, bank details and the card
//! gateway webhook.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::config::BankAccount;
use crate::error::{ApiError, ErrorResponse};
use crate::gateway::paystack::SIGNATURE_HEADER;
use crate::service::payment_service::SettlementReport;

/// `GET /payments/verify/{reference}` — Settle a payment by asking the
/// gateway.
///
/// # Errors
///
/// Returns [`ApiError`] for unknown or foreign references and gateway
/// failures.
#[utoipa::path(
    get,
    path = "/api/v1/payments/verify/{reference}",
    tag = "Payments",
    summary = "Verify a card payment",
    description = "Called after the payer returns from checkout. Queries the gateway and confirms or fails the registration; settled payments are reported as-is.",
    params(
        ("reference" = String, Path, description = "Payment reference"),
    ),
    responses(
        (status = 200, description = "Settlement outcome", body = SettlementReport),
        (status = 403, description = "Payment belongs to another user", body = ErrorResponse),
        (status = 404, description = "Unknown reference", body = ErrorResponse),
        (status = 502, description = "Gateway error", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(reference): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.payments.verify_reference(&auth, &reference).await?;
    Ok(Json(report))
}

/// `GET /payments/bank-account` — Receiving account for transfers.
#[utoipa::path(
    get,
    path = "/api/v1/payments/bank-account",
    tag = "Payments",
    summary = "Bank transfer details",
    responses(
        (status = 200, description = "Receiving account", body = BankAccount),
    )
)]
pub async fn bank_account(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.payments.bank_account().clone())
}

/// `POST /webhooks/paystack` — Card gateway notification.
///
/// # Errors
///
/// Returns [`ApiError::InvalidSignature`] when the HMAC does not match the
/// raw body.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/paystack",
    tag = "Payments",
    summary = "Card gateway webhook",
    description = "Verifies the `x-paystack-signature` HMAC-SHA512 of the raw body, then settles the referenced payment. Repeated notifications are acknowledged without side effects.",
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Notification processed", body = SettlementReport),
        (status = 401, description = "Invalid signature", body = ErrorResponse),
        (status = 409, description = "Amount does not match the payment", body = ErrorResponse),
        (status = 503, description = "Card payments not configured", body = ErrorResponse),
    )
)]
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let report = state.payments.handle_webhook(&body, signature).await?;
    Ok(Json(report))
}

/// Payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/verify/{reference}", get(verify_payment))
        .route("/payments/bank-account", get(bank_account))
        .route("/webhooks/paystack", post(paystack_webhook))
}
