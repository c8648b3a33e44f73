//! Service error types with HTTP status code mapping.
//!
//! [`ApiError`] is the central error type. Each variant maps to a specific
//! HTTP status code and a structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2102,
///     "message": "conflict: badge already scanned for checkin",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`ApiError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                    |
/// |-----------|-----------------------|--------------------------------|
/// | 1000–1099 | Validation            | 400 Bad Request                |
/// | 1100–1199 | Authentication        | 401 / 403                      |
/// | 2000–2099 | Not Found             | 404 Not Found                  |
/// | 2100–2199 | State conflicts       | 409 Conflict                   |
/// | 3000–3999 | Server / upstream     | 500 / 502 / 503                |
/// | 4000–4999 | Business rules        | 403 / 422                      |
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Scanned QR payload is malformed or its checksum does not match.
    #[error("invalid QR code: {0}")]
    InvalidQrCode(String),

    /// Webhook signature missing or wrong.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// Missing or invalid bearer token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated caller lacks the required role or ownership.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Event with the given ID was not found.
    #[error("event not found: {0}")]
    EventNotFound(uuid::Uuid),

    /// Registration with the given ID was not found.
    #[error("registration not found: {0}")]
    RegistrationNotFound(uuid::Uuid),

    /// Payment with the given ID or reference was not found.
    #[error("payment not found: {0}")]
    PaymentNotFound(String),

    /// Ticket (badge) with the given ID or number was not found.
    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    /// Alumni profile for the given user was not found.
    #[error("alumni profile not found: {0}")]
    ProfileNotFound(uuid::Uuid),

    /// Message with the given ID was not found.
    #[error("message not found: {0}")]
    MessageNotFound(uuid::Uuid),

    /// Connection with the given ID was not found.
    #[error("connection not found: {0}")]
    ConnectionNotFound(uuid::Uuid),

    /// Requested status change is not allowed by the lifecycle.
    #[error("invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        /// Entity kind (e.g. `"registration"`).
        entity: &'static str,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// Operation conflicts with existing state (duplicate registration,
    /// repeated scan).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Registration window is closed for the event.
    #[error("registration closed: {0}")]
    RegistrationClosed(String),

    /// Event has no remaining capacity.
    #[error("event is fully booked: {0}")]
    EventFull(uuid::Uuid),

    /// Badge exists but may not be admitted.
    #[error("check-in refused: {0}")]
    CheckinRefused(String),

    /// Payment gateway answered with an error or could not be reached.
    #[error("payment gateway error: {0}")]
    PaymentGateway(String),

    /// Card payments are not configured on this deployment.
    #[error("payment gateway is not configured")]
    GatewayNotConfigured,

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidQrCode(_) => 1002,
            Self::InvalidSignature => 1003,
            Self::Unauthorized(_) => 1101,
            Self::Forbidden(_) => 1102,
            Self::EventNotFound(_) => 2001,
            Self::RegistrationNotFound(_) => 2002,
            Self::PaymentNotFound(_) => 2003,
            Self::TicketNotFound(_) => 2004,
            Self::ProfileNotFound(_) => 2005,
            Self::MessageNotFound(_) => 2006,
            Self::ConnectionNotFound(_) => 2007,
            Self::InvalidTransition { .. } => 2101,
            Self::Conflict(_) => 2102,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::PaymentGateway(_) => 3002,
            Self::GatewayNotConfigured => 3003,
            Self::RegistrationClosed(_) => 4001,
            Self::EventFull(_) => 4002,
            Self::CheckinRefused(_) => 4003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidQrCode(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::CheckinRefused(_) => StatusCode::FORBIDDEN,
            Self::EventNotFound(_)
            | Self::RegistrationNotFound(_)
            | Self::PaymentNotFound(_)
            | Self::TicketNotFound(_)
            | Self::ProfileNotFound(_)
            | Self::MessageNotFound(_)
            | Self::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RegistrationClosed(_) | Self::EventFull(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.error_code(), error = %self, "request rejected");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
