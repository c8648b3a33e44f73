//! Database models: entity records and activity-log rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    AlumniProfile, Connection, Event, Message, Payment, Registration, ScanRecord, Ticket, User,
};
use crate::error::ApiError;

/// Site configuration is stored as a single record under this id.
pub const SITE_CONFIG_ID: &str = "site";

/// One entity as stored in the `records` table.
///
/// Each variant maps to a `kind` discriminator; the entity itself is
/// stored as JSONB.
#[derive(Debug, Clone)]
pub enum Record {
    /// A user.
    User(User),
    /// An event.
    Event(Event),
    /// A registration.
    Registration(Registration),
    /// A payment.
    Payment(Payment),
    /// A ticket.
    Ticket(Ticket),
    /// A scan-log entry.
    Scan(ScanRecord),
    /// An alumni profile.
    Profile(AlumniProfile),
    /// A message.
    Message(Message),
    /// A networking connection.
    Connection(Connection),
    /// The whole site configuration map.
    SiteConfig(serde_json::Map<String, serde_json::Value>),
}

impl Record {
    /// Kind discriminator stored in the `kind` column.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Event(_) => "event",
            Self::Registration(_) => "registration",
            Self::Payment(_) => "payment",
            Self::Ticket(_) => "ticket",
            Self::Scan(_) => "scan",
            Self::Profile(_) => "profile",
            Self::Message(_) => "message",
            Self::Connection(_) => "connection",
            Self::SiteConfig(_) => "site_config",
        }
    }

    /// Primary key stored in the `id` column.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::User(u) => u.id.to_string(),
            Self::Event(e) => e.id.to_string(),
            Self::Registration(r) => r.id.to_string(),
            Self::Payment(p) => p.id.to_string(),
            Self::Ticket(t) => t.id.to_string(),
            Self::Scan(s) => s.id.to_string(),
            Self::Profile(p) => p.user_id.to_string(),
            Self::Message(m) => m.id.to_string(),
            Self::Connection(c) => c.id.to_string(),
            Self::SiteConfig(_) => SITE_CONFIG_ID.to_string(),
        }
    }

    /// Serializes the entity for the `data` column.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PersistenceError`] if serialization fails.
    pub fn to_json(&self) -> Result<serde_json::Value, ApiError> {
        let value = match self {
            Self::User(v) => serde_json::to_value(v),
            Self::Event(v) => serde_json::to_value(v),
            Self::Registration(v) => serde_json::to_value(v),
            Self::Payment(v) => serde_json::to_value(v),
            Self::Ticket(v) => serde_json::to_value(v),
            Self::Scan(v) => serde_json::to_value(v),
            Self::Profile(v) => serde_json::to_value(v),
            Self::Message(v) => serde_json::to_value(v),
            Self::Connection(v) => serde_json::to_value(v),
            Self::SiteConfig(v) => Ok(serde_json::Value::Object(v.clone())),
        };
        value.map_err(|e| ApiError::PersistenceError(e.to_string()))
    }

    /// Rebuilds a record from its stored `kind` and `data`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PersistenceError`] for an unknown kind or a
    /// payload that no longer deserializes.
    pub fn from_row(kind: &str, data: serde_json::Value) -> Result<Self, ApiError> {
        fn parse<T: for<'de> Deserialize<'de>>(data: serde_json::Value) -> Result<T, ApiError> {
            serde_json::from_value(data).map_err(|e| ApiError::PersistenceError(e.to_string()))
        }
        Ok(match kind {
            "user" => Self::User(parse(data)?),
            "event" => Self::Event(parse(data)?),
            "registration" => Self::Registration(parse(data)?),
            "payment" => Self::Payment(parse(data)?),
            "ticket" => Self::Ticket(parse(data)?),
            "scan" => Self::Scan(parse(data)?),
            "profile" => Self::Profile(parse(data)?),
            "message" => Self::Message(parse(data)?),
            "connection" => Self::Connection(parse(data)?),
            "site_config" => Self::SiteConfig(parse(data)?),
            other => {
                return Err(ApiError::PersistenceError(format!(
                    "unknown record kind: {other}"
                )));
            }
        })
    }
}

/// A stored row from the `activity_log` table.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StoredActivity {
    /// Auto-increment row ID.
    pub id: i64,
    /// Event the activity belongs to.
    pub event_id: Uuid,
    /// Activity type discriminator (e.g. `"badge_scanned"`).
    pub activity_type: String,
    /// JSONB payload.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}
