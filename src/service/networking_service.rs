//! Networking service: connection requests between alumni.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{Outbox, Page, ServiceContext};
use crate::auth::AuthUser;
use crate::domain::connection::MAX_NOTE_LEN;
use crate::domain::{Connection, ConnectionId, ConnectionStatus, StoreState, UserId};
use crate::error::ApiError;
use crate::persistence::Record;

/// Body of `POST /alumni/{user_id}/connect`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ConnectRequest {
    /// Optional introduction note.
    pub message: Option<String>,
}

/// Body of `POST /me/connections/{id}/respond`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ConnectionResponse {
    /// `ACCEPTED` or `DECLINED`.
    pub status: ConnectionStatus,
}

/// Query of `GET /me/connections`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConnectionFilter {
    /// Only this status.
    pub status: Option<ConnectionStatus>,
    /// Items to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size (1..=100, default 20).
    pub limit: Option<usize>,
}

/// A connection seen from one member's side.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionView {
    /// Connection identifier.
    pub id: ConnectionId,
    /// The other member.
    pub peer_id: UserId,
    /// Directory name of the other member, if known.
    pub peer_name: Option<String>,
    /// `true` when the other member asked.
    pub incoming: bool,
    /// Current state.
    pub status: ConnectionStatus,
    /// Introduction note.
    pub message: Option<String>,
    /// Request time.
    pub created_at: DateTime<Utc>,
    /// Time the receiver answered.
    pub responded_at: Option<DateTime<Utc>>,
}

impl ConnectionView {
    fn build(state: &StoreState, viewer: UserId, conn: &Connection) -> Self {
        let peer_id = conn.peer_of(viewer);
        let peer_name = state
            .profiles
            .get(&peer_id)
            .map(|p| p.display_name.clone())
            .or_else(|| state.users.get(&peer_id).map(|u| u.full_name.clone()));
        Self {
            id: conn.id,
            peer_id,
            peer_name,
            incoming: conn.receiver_id == viewer,
            status: conn.status,
            message: conn.message.clone(),
            created_at: conn.created_at,
            responded_at: conn.responded_at,
        }
    }
}

/// Connection operations.
#[derive(Debug, Clone)]
pub struct NetworkingService {
    ctx: ServiceContext,
}

impl NetworkingService {
    /// Creates a new `NetworkingService`.
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Asks `receiver` to connect.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for a request to oneself or an
    /// oversized note, [`ApiError::ProfileNotFound`] if the receiver has no
    /// listed profile and [`ApiError::Conflict`] if the pair already has a
    /// connection in either direction, whatever its status.
    pub async fn request(
        &self,
        auth: &AuthUser,
        receiver: UserId,
        input: ConnectRequest,
    ) -> Result<Connection, ApiError> {
        if receiver == auth.id {
            return Err(ApiError::InvalidRequest(
                "cannot connect to yourself".to_string(),
            ));
        }
        let message = input
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if message
            .as_deref()
            .is_some_and(|m| m.chars().count() > MAX_NOTE_LEN)
        {
            return Err(ApiError::InvalidRequest(format!(
                "message must be at most {MAX_NOTE_LEN} characters"
            )));
        }

        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let connection = {
            if !state.profiles.get(&receiver).is_some_and(|p| p.is_public) {
                return Err(ApiError::ProfileNotFound(*receiver.as_uuid()));
            }
            if let Some(existing) = state
                .connections
                .values()
                .find(|c| c.links(auth.id, receiver))
            {
                return Err(ApiError::Conflict(format!(
                    "connection already exists ({})",
                    existing.status
                )));
            }
            let connection = Connection {
                id: ConnectionId::new(),
                requester_id: auth.id,
                receiver_id: receiver,
                status: ConnectionStatus::Pending,
                message,
                created_at: Utc::now(),
                responded_at: None,
            };
            state.connections.insert(connection.id, connection.clone());
            outbox.save(Record::Connection(connection.clone()));
            connection
        };
        self.ctx.commit(state, outbox).await;
        tracing::info!(connection_id = %connection.id, requester = %auth.id, %receiver, "connection requested");
        Ok(connection)
    }

    /// Accepts or declines a pending request addressed to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ConnectionNotFound`] unless the caller is the
    /// receiver and [`ApiError::InvalidTransition`] if the request was
    /// already answered.
    pub async fn respond(
        &self,
        auth: &AuthUser,
        id: ConnectionId,
        status: ConnectionStatus,
    ) -> Result<Connection, ApiError> {
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let connection = {
            let connection = state
                .connections
                .get_mut(&id)
                .filter(|c| c.receiver_id == auth.id)
                .ok_or(ApiError::ConnectionNotFound(*id.as_uuid()))?;
            connection.respond(status)?;
            outbox.save(Record::Connection(connection.clone()));
            connection.clone()
        };
        self.ctx.commit(state, outbox).await;
        tracing::info!(connection_id = %id, %status, "connection answered");
        Ok(connection)
    }

    /// Accepts a pending request addressed to the caller.
    ///
    /// # Errors
    ///
    /// See [`Self::respond`].
    pub async fn accept(&self, auth: &AuthUser, id: ConnectionId) -> Result<Connection, ApiError> {
        self.respond(auth, id, ConnectionStatus::Accepted).await
    }

    /// The caller's connections in both directions, newest first.
    pub async fn list(&self, auth: &AuthUser, filter: &ConnectionFilter) -> Page<ConnectionView> {
        let limit = filter
            .limit
            .unwrap_or(super::event_service::DEFAULT_LIMIT)
            .clamp(1, super::event_service::MAX_LIMIT);
        let state = self.ctx.store.read().await;
        let mut connections: Vec<&Connection> = state
            .connections
            .values()
            .filter(|c| c.involves(auth.id))
            .filter(|c| filter.status.is_none_or(|s| c.status == s))
            .collect();
        connections.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let views = connections
            .into_iter()
            .map(|c| ConnectionView::build(&state, auth.id, c))
            .collect();
        Page::slice(views, filter.offset, limit)
    }
}
