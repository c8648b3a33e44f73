//! Alumni directory handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{AlumniProfile, UserId};
use crate::error::{ApiError, ErrorResponse};
use crate::service::Page;
use crate::service::directory_service::{DirectoryQuery, ProfileInput};

/// `GET /alumni` — Search the directory.
#[utoipa::path(
    get,
    path = "/api/v1/alumni",
    tag = "Alumni",
    summary = "Search the directory",
    description = "Public profiles matching every supplied filter, sorted by name. Admins may include hidden profiles.",
    params(DirectoryQuery),
    responses(
        (status = 200, description = "Page of profiles", body = Page<AlumniProfile>),
    )
)]
pub async fn list_alumni(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Query(query): Query<DirectoryQuery>,
) -> impl IntoResponse {
    Json(state.directory.list(viewer.as_ref(), &query).await)
}

/// `GET /alumni/{user_id}` — One profile.
///
/// # Errors
///
/// Returns [`ApiError::ProfileNotFound`] for missing or hidden profiles.
#[utoipa::path(
    get,
    path = "/api/v1/alumni/{user_id}",
    tag = "Alumni",
    summary = "Get a profile",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "Profile", body = AlumniProfile),
        (status = 404, description = "Profile not found", body = ErrorResponse),
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(user_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .directory
        .get(viewer.as_ref(), UserId::from_uuid(user_id))
        .await?;
    Ok(Json(profile))
}

/// `PUT /me/profile` — Create or replace the caller's profile.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] for invalid fields.
#[utoipa::path(
    put,
    path = "/api/v1/me/profile",
    tag = "Alumni",
    summary = "Update own profile",
    request_body = ProfileInput,
    responses(
        (status = 200, description = "Saved profile", body = AlumniProfile),
        (status = 400, description = "Invalid fields", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn upsert_own_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(input): Json<ProfileInput>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state.directory.upsert_own(&auth, input).await?;
    Ok(Json(profile))
}

/// Directory routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alumni", get(list_alumni))
        .route("/alumni/{user_id}", get(get_profile))
        .route("/me/profile", put(upsert_own_profile))
}
