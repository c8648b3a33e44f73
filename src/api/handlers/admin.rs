//! Admin dashboard handlers and the public site configuration.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;

use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{
    AlumniProfile, Message, MessageId, Payment, PaymentId, Registration, RegistrationId, UserId,
};
use crate::error::{ApiError, ErrorResponse};
use crate::persistence::models::StoredActivity;
use crate::service::Page;
use crate::service::admin_service::{ActivityQuery, PlatformAnalytics};
use crate::service::directory_service::ProfileInput;
use crate::service::message_service::{MessageFilter, MessageStatusUpdate, OutgoingMessage};
use crate::service::payment_service::{PaymentFilter, VerifyBankTransfer};
use crate::service::registration_service::{RegistrationFilter, RegistrationRow, StatusOverride};

// ── Registrations ───────────────────────────────────────────────────────

/// `GET /admin/registrations` — Registration table.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/admin/registrations",
    tag = "Admin",
    summary = "List registrations",
    description = "Filter by event, status and a search over name, email and ticket number. Newest first.",
    params(RegistrationFilter),
    responses(
        (status = 200, description = "Page of registrations", body = Page<RegistrationRow>),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_registrations(
    State(state): State<AppState>,
    admin: AuthUser,
    Query(filter): Query<RegistrationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.registrations.admin_list(&admin, &filter).await?;
    Ok(Json(page))
}

/// `GET /admin/registrations/export` — CSV of the filtered registrations.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/admin/registrations/export",
    tag = "Admin",
    summary = "Export registrations as CSV",
    description = "Same filters as the registration table, without pagination: one row per matching registration.",
    params(RegistrationFilter),
    responses(
        (status = 200, description = "CSV attachment", body = String, content_type = "text/csv"),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn export_registrations(
    State(state): State<AppState>,
    admin: AuthUser,
    Query(filter): Query<RegistrationFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let csv = state.registrations.export_csv(&admin, &filter).await?;
    let disposition = format!(
        "attachment; filename=\"registrations-{}.csv\"",
        Utc::now().format("%Y%m%d-%H%M%S")
    );
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

/// `POST /admin/registrations/{id}/status` — Override a registration
/// status.
///
/// # Errors
///
/// Returns [`ApiError::InvalidTransition`] for moves the lifecycle does not
/// allow.
#[utoipa::path(
    post,
    path = "/api/v1/admin/registrations/{id}/status",
    tag = "Admin",
    summary = "Change registration status",
    description = "PENDING may become CONFIRMED (issuing the ticket), CANCELLED or PAYMENT_FAILED. Closed registrations never change.",
    params(
        ("id" = uuid::Uuid, Path, description = "Registration UUID"),
    ),
    request_body = StatusOverride,
    responses(
        (status = 200, description = "Updated registration", body = Registration),
        (status = 404, description = "Registration not found", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn set_registration_status(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<StatusOverride>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = state
        .registrations
        .admin_set_status(&admin, RegistrationId::from_uuid(id), body.status)
        .await?;
    Ok(Json(registration))
}

// ── Payments ────────────────────────────────────────────────────────────

/// `GET /admin/payments` — Payment table.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/admin/payments",
    tag = "Admin",
    summary = "List payments",
    params(PaymentFilter),
    responses(
        (status = 200, description = "Page of payments", body = Page<Payment>),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_payments(
    State(state): State<AppState>,
    admin: AuthUser,
    Query(filter): Query<PaymentFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.payments.admin_list(&admin, &filter).await?;
    Ok(Json(page))
}

/// `POST /admin/payments/{id}/verify` — Approve or reject a bank transfer.
///
/// # Errors
///
/// Returns [`ApiError::Conflict`] unless the payment awaits verification.
#[utoipa::path(
    post,
    path = "/api/v1/admin/payments/{id}/verify",
    tag = "Admin",
    summary = "Verify a bank transfer",
    description = "Approval completes the payment, confirms the registration and issues the ticket. Rejection fails both.",
    params(
        ("id" = uuid::Uuid, Path, description = "Payment UUID"),
    ),
    request_body = VerifyBankTransfer,
    responses(
        (status = 200, description = "Settled payment", body = Payment),
        (status = 404, description = "Payment not found", body = ErrorResponse),
        (status = 409, description = "Payment is not awaiting verification", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn verify_bank_transfer(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<VerifyBankTransfer>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .payments
        .admin_verify_bank_transfer(&admin, PaymentId::from_uuid(id), body)
        .await?;
    Ok(Json(payment))
}

// ── Messages ────────────────────────────────────────────────────────────

/// `GET /admin/messages` — Every message.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/admin/messages",
    tag = "Admin",
    summary = "List messages",
    params(MessageFilter),
    responses(
        (status = 200, description = "Page of messages", body = Page<Message>),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    admin: AuthUser,
    Query(filter): Query<MessageFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.messages.admin_list(&admin, &filter).await?;
    Ok(Json(page))
}

/// `POST /admin/messages` — Send an announcement or a direct message.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] for an unknown recipient.
#[utoipa::path(
    post,
    path = "/api/v1/admin/messages",
    tag = "Admin",
    summary = "Send a message",
    description = "Without `recipient_id` the message is an announcement shown to every member.",
    request_body = OutgoingMessage,
    responses(
        (status = 201, description = "Message sent", body = Message),
        (status = 400, description = "Invalid message", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(body): Json<OutgoingMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state.messages.admin_send(&admin, body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /admin/messages/{id}/status` — Change a message status.
///
/// # Errors
///
/// Returns [`ApiError::MessageNotFound`] for unknown messages.
#[utoipa::path(
    post,
    path = "/api/v1/admin/messages/{id}/status",
    tag = "Admin",
    summary = "Change message status",
    params(
        ("id" = uuid::Uuid, Path, description = "Message UUID"),
    ),
    request_body = MessageStatusUpdate,
    responses(
        (status = 200, description = "Updated message", body = Message),
        (status = 404, description = "Message not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn set_message_status(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<MessageStatusUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let message = state
        .messages
        .admin_set_status(&admin, MessageId::from_uuid(id), body.status)
        .await?;
    Ok(Json(message))
}

// ── Directory, analytics, configuration ─────────────────────────────────

/// `PUT /admin/alumni/{user_id}` — Edit any profile.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] for invalid fields.
#[utoipa::path(
    put,
    path = "/api/v1/admin/alumni/{user_id}",
    tag = "Admin",
    summary = "Edit a profile",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User UUID"),
    ),
    request_body = ProfileInput,
    responses(
        (status = 200, description = "Saved profile", body = AlumniProfile),
        (status = 400, description = "Invalid fields", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn edit_profile(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(user_id): Path<uuid::Uuid>,
    Json(input): Json<ProfileInput>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .directory
        .admin_update(&admin, UserId::from_uuid(user_id), input)
        .await?;
    Ok(Json(profile))
}

/// `GET /admin/analytics` — Platform totals.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] for non-admins.
#[utoipa::path(
    get,
    path = "/api/v1/admin/analytics",
    tag = "Admin",
    summary = "Platform analytics",
    responses(
        (status = 200, description = "Platform totals", body = PlatformAnalytics),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn analytics(
    State(state): State<AppState>,
    admin: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let totals = state.admin.analytics(&admin).await?;
    Ok(Json(totals))
}

/// `GET /admin/activity` — Stored activity log.
///
/// # Errors
///
/// Returns [`ApiError`] for non-admins or a failing query.
#[utoipa::path(
    get,
    path = "/api/v1/admin/activity",
    tag = "Admin",
    summary = "Activity log",
    description = "Activities recorded since `since` (default: the last 24 hours), oldest first. Empty when persistence is disabled.",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Stored activities", body = Vec<StoredActivity>),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn activity_log(
    State(state): State<AppState>,
    admin: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.admin.activity_log(&admin, &query).await?;
    Ok(Json(rows))
}

/// `GET /site-config` — Public site configuration.
#[utoipa::path(
    get,
    path = "/api/v1/site-config",
    tag = "Site",
    summary = "Site configuration",
    responses(
        (status = 200, description = "Configuration keys and values", body = Object),
    )
)]
pub async fn site_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.admin.site_config().await)
}

/// `PUT /admin/site-config` — Set configuration keys.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] for blank or overlong keys.
#[utoipa::path(
    put,
    path = "/api/v1/admin/site-config",
    tag = "Admin",
    summary = "Update site configuration",
    description = "Sets every key in the body; a `null` value removes the key. Keys not mentioned are kept.",
    request_body(content = Object, description = "Keys to set or remove"),
    responses(
        (status = 200, description = "Configuration after the update", body = Object),
        (status = 400, description = "Invalid key", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn update_site_config(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(changes): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.admin.update_site_config(&admin, changes).await?;
    Ok(Json(config))
}

/// Admin and site-configuration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/registrations", get(list_registrations))
        .route("/admin/registrations/export", get(export_registrations))
        .route(
            "/admin/registrations/{id}/status",
            post(set_registration_status),
        )
        .route("/admin/payments", get(list_payments))
        .route("/admin/payments/{id}/verify", post(verify_bank_transfer))
        .route("/admin/messages", get(list_messages).post(send_message))
        .route("/admin/messages/{id}/status", post(set_message_status))
        .route("/admin/alumni/{user_id}", put(edit_profile))
        .route("/admin/analytics", get(analytics))
        .route("/admin/activity", get(activity_log))
        .route("/admin/site-config", put(update_site_config))
        .route("/site-config", get(site_config))
}
