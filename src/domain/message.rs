//! Contact-form messages, announcements and direct messages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MessageId, UserId};
use crate::error::ApiError;

/// Origin of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Sent through the public contact form to the admin inbox.
    Contact,
    /// Admin broadcast to every member.
    Announcement,
    /// Admin message to one member.
    Direct,
}

/// Read state of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Not opened yet.
    Unread,
    /// Opened.
    Read,
    /// Filed away.
    Archived,
}

impl MessageStatus {
    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "UNREAD",
            Self::Read => "READ",
            Self::Archived => "ARCHIVED",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UNREAD" => Ok(Self::Unread),
            "READ" => Ok(Self::Read),
            "ARCHIVED" => Ok(Self::Archived),
            other => Err(ApiError::InvalidRequest(format!(
                "unknown message status: {other}"
            ))),
        }
    }
}

/// A stored message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Origin.
    pub kind: MessageKind,
    /// Authenticated sender, if any.
    pub sender_id: Option<UserId>,
    /// Sender name as typed in the contact form.
    pub sender_name: String,
    /// Reply-to address.
    pub sender_email: String,
    /// Recipient; `None` means the admin inbox (contact) or everyone
    /// (announcement).
    pub recipient_id: Option<UserId>,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Read state.
    pub status: MessageStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Returns `true` if `user` should see this message in their inbox.
    #[must_use]
    pub fn is_visible_to(&self, user: UserId) -> bool {
        match self.kind {
            MessageKind::Announcement => true,
            MessageKind::Direct => self.recipient_id == Some(user),
            MessageKind::Contact => self.sender_id == Some(user),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(kind: MessageKind, recipient: Option<UserId>) -> Message {
        let now = Utc::now();
        Message {
            id: MessageId::new(),
            kind,
            sender_id: None,
            sender_name: "Admin".to_string(),
            sender_email: "admin@example.org".to_string(),
            recipient_id: recipient,
            subject: "Hello".to_string(),
            body: "Body".to_string(),
            status: MessageStatus::Unread,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn direct_messages_are_private() {
        let alice = UserId::new();
        let msg = message(MessageKind::Direct, Some(alice));
        assert!(msg.is_visible_to(alice));
        assert!(!msg.is_visible_to(UserId::new()));
    }

    #[test]
    fn announcements_reach_everyone() {
        assert!(message(MessageKind::Announcement, None).is_visible_to(UserId::new()));
    }
}
