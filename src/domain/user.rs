//! Platform users as known from bearer-token claims.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;

/// Access role carried in the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full administrative access.
    Admin,
    /// May run check-in and read event dashboards.
    Organizer,
    /// Regular alumni member.
    Member,
}

impl Role {
    /// Returns `true` for roles allowed to operate the check-in desk.
    #[must_use]
    pub const fn can_check_in(self) -> bool {
        matches!(self, Self::Admin | Self::Organizer)
    }

    /// Returns `true` for the admin role.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Organizer => "ORGANIZER",
            Self::Member => "MEMBER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Self::Admin),
            "ORGANIZER" => Ok(Self::Organizer),
            "MEMBER" | "USER" | "ATTENDEE" => Ok(Self::Member),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A platform user, upserted from token claims on first contact.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// User identifier (token subject).
    pub id: UserId,
    /// Contact email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Access role.
    pub role: Role,
    /// First time the service saw this user.
    pub created_at: DateTime<Utc>,
    /// Last claim sync.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user record.
    #[must_use]
    pub fn new(id: UserId, email: String, full_name: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id,
            email,
            full_name,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}
