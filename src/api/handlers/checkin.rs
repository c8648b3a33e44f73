//! Door handlers for organizers and admins.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::EventId;
use crate::error::{ApiError, ErrorResponse};
use crate::service::checkin_service::{
    CheckedInAttendee, CheckinQuery, ScanRequest, ScanResult, ScanSummary,
};

/// `POST /checkin/scan` — Scan a badge.
///
/// # Errors
///
/// Returns [`ApiError`] for tampered codes, unknown tickets, unconfirmed
/// registrations and repeated scans.
#[utoipa::path(
    post,
    path = "/api/v1/checkin/scan",
    tag = "Check-in",
    summary = "Scan a badge",
    description = "Accepts the decoded QR payload or a typed ticket number. A scan with the same direction as the ticket's previous scan is rejected.",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Scan accepted", body = ScanResult),
        (status = 400, description = "Malformed or tampered QR code", body = ErrorResponse),
        (status = 403, description = "Not admitted, or caller is not staff", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse),
        (status = 409, description = "Already scanned in this direction", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn scan_badge(
    State(state): State<AppState>,
    staff: AuthUser,
    Json(request): Json<ScanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.checkin.scan(&staff, request).await?;
    Ok(Json(result))
}

/// `GET /checkin/events/{id}/scans` — Recent scans and totals.
///
/// # Errors
///
/// Returns [`ApiError`] for members or unknown events.
#[utoipa::path(
    get,
    path = "/api/v1/checkin/events/{id}/scans",
    tag = "Check-in",
    summary = "Recent scans",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        CheckinQuery,
    ),
    responses(
        (status = 200, description = "Scan summary", body = ScanSummary),
        (status = 404, description = "Event not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn recent_scans(
    State(state): State<AppState>,
    staff: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Query(query): Query<CheckinQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .checkin
        .recent_scans(&staff, EventId::from_uuid(id), &query)
        .await?;
    Ok(Json(summary))
}

/// `GET /checkin/events/{id}/attendees` — Checked-in attendees.
///
/// # Errors
///
/// Returns [`ApiError`] for members or unknown events.
#[utoipa::path(
    get,
    path = "/api/v1/checkin/events/{id}/attendees",
    tag = "Check-in",
    summary = "Checked-in attendees",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
        CheckinQuery,
    ),
    responses(
        (status = 200, description = "Attendees with at least one check-in", body = Vec<CheckedInAttendee>),
        (status = 404, description = "Event not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn checked_in(
    State(state): State<AppState>,
    staff: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Query(query): Query<CheckinQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let attendees = state
        .checkin
        .checked_in(&staff, EventId::from_uuid(id), &query)
        .await?;
    Ok(Json(attendees))
}

/// Check-in routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/checkin/scan", post(scan_badge))
        .route("/checkin/events/{id}/scans", get(recent_scans))
        .route("/checkin/events/{id}/attendees", get(checked_in))
}
