//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;

/// Query string of `GET /ws`.
#[derive(Debug, Deserialize)]
pub struct WsAuth {
    /// Bearer token; browsers cannot set headers on WebSocket upgrades.
    pub token: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to WebSocket.
///
/// The token comes from `?token=` or the `Authorization` header. Only
/// organizers and admins may follow the live feed.
///
/// # Errors
///
/// Returns [`ApiError::Unauthorized`] without a valid token and
/// [`ApiError::Forbidden`] for members.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(auth): Query<WsAuth>,
    header_user: Option<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = match (auth.token, header_user) {
        (Some(token), _) => AuthUser::from_token(&state.jwt, &token)?,
        (None, Some(user)) => user,
        (None, None) => {
            return Err(ApiError::Unauthorized("missing token".to_string()));
        }
    };
    viewer.require_staff()?;

    let activity_rx = state.bus.subscribe();
    Ok(ws.on_upgrade(move |socket| run_connection(socket, activity_rx, viewer)))
}
