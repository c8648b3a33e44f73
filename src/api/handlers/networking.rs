//! Networking handlers: connection requests between alumni.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{Connection, ConnectionId, UserId};
use crate::error::{ApiError, ErrorResponse};
use crate::service::Page;
use crate::service::networking_service::{
    ConnectRequest, ConnectionFilter, ConnectionResponse, ConnectionView,
};

/// `POST /alumni/{user_id}/connect` — Ask a member to connect.
///
/// # Errors
///
/// Returns [`ApiError::Conflict`] when the pair already has a connection.
#[utoipa::path(
    post,
    path = "/api/v1/alumni/{user_id}/connect",
    tag = "Alumni",
    summary = "Request a connection",
    params(
        ("user_id" = uuid::Uuid, Path, description = "Member to connect with"),
    ),
    request_body = ConnectRequest,
    responses(
        (status = 201, description = "Pending connection", body = Connection),
        (status = 400, description = "Request to oneself or oversized note", body = ErrorResponse),
        (status = 404, description = "No listed profile", body = ErrorResponse),
        (status = 409, description = "Connection already exists", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn request_connection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<uuid::Uuid>,
    Json(input): Json<ConnectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let connection = state
        .networking
        .request(&auth, UserId::from_uuid(user_id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(connection)))
}

/// `GET /me/connections` — The caller's connections.
#[utoipa::path(
    get,
    path = "/api/v1/me/connections",
    tag = "Alumni",
    summary = "List own connections",
    description = "Requests sent and received, newest first, with their status.",
    params(ConnectionFilter),
    responses(
        (status = 200, description = "Page of connections", body = Page<ConnectionView>),
    ),
    security(("bearer" = []))
)]
pub async fn my_connections(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<ConnectionFilter>,
) -> impl IntoResponse {
    Json(state.networking.list(&auth, &filter).await)
}

/// `POST /me/connections/{id}/respond` — Accept or decline a request.
///
/// # Errors
///
/// Returns [`ApiError::ConnectionNotFound`] unless the caller received the
/// request and [`ApiError::InvalidTransition`] once it was answered.
#[utoipa::path(
    post,
    path = "/api/v1/me/connections/{id}/respond",
    tag = "Alumni",
    summary = "Answer a connection request",
    params(
        ("id" = uuid::Uuid, Path, description = "Connection UUID"),
    ),
    request_body = ConnectionResponse,
    responses(
        (status = 200, description = "Answered connection", body = Connection),
        (status = 404, description = "Connection not found", body = ErrorResponse),
        (status = 409, description = "Already answered", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn respond_connection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<ConnectionResponse>,
) -> Result<impl IntoResponse, ApiError> {
    let connection = state
        .networking
        .respond(&auth, ConnectionId::from_uuid(id), body.status)
        .await?;
    Ok(Json(connection))
}

/// `POST /me/connections/{id}/accept` — Accept a request.
///
/// # Errors
///
/// Same as [`respond_connection`].
#[utoipa::path(
    post,
    path = "/api/v1/me/connections/{id}/accept",
    tag = "Alumni",
    summary = "Accept a connection request",
    params(
        ("id" = uuid::Uuid, Path, description = "Connection UUID"),
    ),
    responses(
        (status = 200, description = "Accepted connection", body = Connection),
        (status = 404, description = "Connection not found", body = ErrorResponse),
        (status = 409, description = "Already answered", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn accept_connection(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let connection = state
        .networking
        .accept(&auth, ConnectionId::from_uuid(id))
        .await?;
    Ok(Json(connection))
}

/// Networking routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alumni/{user_id}/connect", post(request_connection))
        .route("/me/connections", get(my_connections))
        .route("/me/connections/{id}/respond", post(respond_connection))
        .route("/me/connections/{id}/accept", post(accept_connection))
}
