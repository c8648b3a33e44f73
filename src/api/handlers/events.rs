//! Event catalogue handlers: listing, detail, admin lifecycle and stats.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{DeletedResponse, EventStatusChange};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{EventId, EventView};
use crate::error::{ApiError, ErrorResponse};
use crate::service::Page;
use crate::service::event_service::{
    CatalogueOverview, EventInput, EventPatch, EventQuery, EventStats,
};

/// `GET /events` — Filtered, sorted, paginated catalogue.
///
/// # Errors
///
/// Returns [`ApiError`] on invalid filters or when a non-admin asks for
/// drafts or private events.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "List events",
    description = "Returns events matching every supplied filter. Without a status filter only published and completed events are listed; past events are hidden unless `show_past=true`.",
    params(EventQuery),
    responses(
        (status = 200, description = "Page of events", body = Page<EventView>),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 403, description = "Filter reserved for admins", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Query(query): Query<EventQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.events.list(viewer.as_ref(), &query).await?;
    Ok(Json(page))
}

/// `GET /events/overview` — Cached catalogue totals.
#[utoipa::path(
    get,
    path = "/api/v1/events/overview",
    tag = "Events",
    summary = "Catalogue overview",
    description = "Event and registration totals plus the tag cloud. Cached for a short time and refreshed after any event change.",
    responses(
        (status = 200, description = "Catalogue totals", body = CatalogueOverview),
    )
)]
pub async fn overview(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.events.overview().await)
}

/// `POST /events` — Create an event.
///
/// # Errors
///
/// Returns [`ApiError`] for non-admins or invalid fields.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Create an event",
    description = "Creates a DRAFT (default) or PUBLISHED event. Admin only.",
    request_body = EventInput,
    responses(
        (status = 201, description = "Event created", body = EventView),
        (status = 400, description = "Invalid event", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create_event(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(input): Json<EventInput>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state.events.create(&admin, input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// `GET /events/{id}` — Event detail.
///
/// # Errors
///
/// Returns [`ApiError::EventNotFound`] for unknown events and for drafts
/// or private events requested by non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get an event",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event detail", body = EventView),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .events
        .get(viewer.as_ref(), EventId::from_uuid(id))
        .await?;
    Ok(Json(event))
}

/// `PATCH /events/{id}` — Edit an event.
///
/// # Errors
///
/// Returns [`ApiError`] for non-admins, closed events or a capacity below
/// the active registrations.
#[utoipa::path(
    patch,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Update an event",
    description = "Applies the supplied fields. Cancelled and completed events are read-only.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = EventPatch,
    responses(
        (status = 200, description = "Updated event", body = EventView),
        (status = 400, description = "Invalid fields", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Event is closed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn update_event(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(patch): Json<EventPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .events
        .update(&admin, EventId::from_uuid(id), patch)
        .await?;
    Ok(Json(event))
}

/// `DELETE /events/{id}` — Delete a draft.
///
/// # Errors
///
/// Returns [`ApiError::Conflict`] unless the event is a draft without
/// registrations.
#[utoipa::path(
    delete,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Delete a draft event",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event deleted", body = DeletedResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Event is not a deletable draft", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn delete_event(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.events.delete(&admin, EventId::from_uuid(id)).await?;
    Ok(Json(DeletedResponse::now(id)))
}

/// `POST /events/{id}/status` — Move an event through its lifecycle.
///
/// # Errors
///
/// Returns [`ApiError::InvalidTransition`] for disallowed moves.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/status",
    tag = "Events",
    summary = "Change event status",
    description = "DRAFT → PUBLISHED → COMPLETED, or CANCELLED from DRAFT or PUBLISHED.",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = EventStatusChange,
    responses(
        (status = 200, description = "Event after the change", body = EventView),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn change_status(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<EventStatusChange>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .events
        .change_status(&admin, EventId::from_uuid(id), body.status)
        .await?;
    Ok(Json(event))
}

/// `GET /events/{id}/stats` — Registration and revenue breakdown.
///
/// # Errors
///
/// Returns [`ApiError`] for members or unknown events.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/stats",
    tag = "Events",
    summary = "Event statistics",
    params(
        ("id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event statistics", body = EventStats),
        (status = 403, description = "Organizer or admin role required", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn event_stats(
    State(state): State<AppState>,
    staff: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.events.stats(&staff, EventId::from_uuid(id)).await?;
    Ok(Json(stats))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/overview", get(overview))
        .route(
            "/events/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
        .route("/events/{id}/status", post(change_status))
        .route("/events/{id}/stats", get(event_stats))
}
