//! Member-to-member networking connections.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ConnectionId, UserId};
use crate::error::ApiError;

/// Longest accepted introduction note.
pub const MAX_NOTE_LEN: usize = 500;

/// State of a connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Waiting for the receiver.
    Pending,
    /// Receiver accepted.
    Accepted,
    /// Receiver declined.
    Declined,
}

impl ConnectionStatus {
    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "DECLINED" => Ok(Self::Declined),
            other => Err(ApiError::InvalidRequest(format!(
                "unknown connection status: {other}"
            ))),
        }
    }
}

/// A connection between two members. At most one exists per pair,
/// whichever side asked first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Connection {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Member who asked.
    pub requester_id: UserId,
    /// Member who answers.
    pub receiver_id: UserId,
    /// Current state.
    pub status: ConnectionStatus,
    /// Optional introduction note.
    pub message: Option<String>,
    /// Request time.
    pub created_at: DateTime<Utc>,
    /// Time the receiver answered.
    pub responded_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Returns `true` if the connection links `a` and `b` in either
    /// direction.
    #[must_use]
    pub fn links(&self, a: UserId, b: UserId) -> bool {
        (self.requester_id == a && self.receiver_id == b)
            || (self.requester_id == b && self.receiver_id == a)
    }

    /// Returns `true` if `user` is either side.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.requester_id == user || self.receiver_id == user
    }

    /// The member on the other side from `user`.
    #[must_use]
    pub fn peer_of(&self, user: UserId) -> UserId {
        if self.requester_id == user {
            self.receiver_id
        } else {
            self.requester_id
        }
    }

    /// Records the receiver's answer.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidTransition`] unless the connection is
    /// pending and `next` is an answer.
    pub fn respond(&mut self, next: ConnectionStatus) -> Result<(), ApiError> {
        if self.status != ConnectionStatus::Pending || next == ConnectionStatus::Pending {
            return Err(ApiError::InvalidTransition {
                entity: "connection",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.responded_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn pending() -> Connection {
        Connection {
            id: ConnectionId::new(),
            requester_id: UserId::new(),
            receiver_id: UserId::new(),
            status: ConnectionStatus::Pending,
            message: None,
            created_at: Utc::now(),
            responded_at: None,
        }
    }

    #[test]
    fn links_both_directions() {
        let conn = pending();
        assert!(conn.links(conn.requester_id, conn.receiver_id));
        assert!(conn.links(conn.receiver_id, conn.requester_id));
        assert!(!conn.links(conn.requester_id, UserId::new()));
        assert_eq!(conn.peer_of(conn.receiver_id), conn.requester_id);
    }

    #[test]
    fn only_pending_connections_take_an_answer() {
        let mut conn = pending();
        assert!(conn.respond(ConnectionStatus::Pending).is_err());
        assert!(conn.respond(ConnectionStatus::Accepted).is_ok());
        assert!(conn.responded_at.is_some());
        let Err(ApiError::InvalidTransition { from, to, .. }) =
            conn.respond(ConnectionStatus::Declined)
        else {
            panic!("answered twice");
        };
        assert_eq!(from, "ACCEPTED");
        assert_eq!(to, "DECLINED");
    }

    #[test]
    fn status_parses_any_case() {
        assert!(matches!(
            "accepted".parse::<ConnectionStatus>(),
            Ok(ConnectionStatus::Accepted)
        ));
        assert!("blocked".parse::<ConnectionStatus>().is_err());
    }
}
