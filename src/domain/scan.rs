//! Append-only badge scan log.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, ScanId, TicketId, UserId};
use crate::error::ApiError;

/// Location recorded when the scanner does not send one.
pub const DEFAULT_SCAN_LOCATION: &str = "main_entrance";

/// Direction of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanType {
    /// Entering the venue.
    #[default]
    Checkin,
    /// Leaving the venue.
    Checkout,
}

impl ScanType {
    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Checkin => "CHECKIN",
            Self::Checkout => "CHECKOUT",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CHECKIN" | "CHECK_IN" => Ok(Self::Checkin),
            "CHECKOUT" | "CHECK_OUT" => Ok(Self::Checkout),
            other => Err(ApiError::InvalidRequest(format!("unknown scan type: {other}"))),
        }
    }
}

/// One accepted scan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanRecord {
    /// Scan identifier.
    pub id: ScanId,
    /// Scanned ticket.
    pub ticket_id: TicketId,
    /// Event of the ticket.
    pub event_id: EventId,
    /// Direction.
    pub scan_type: ScanType,
    /// Door or desk name.
    pub scan_location: String,
    /// Staff member operating the scanner.
    pub scanned_by: UserId,
    /// Scanner session, if the client tracks one.
    pub session_id: Option<String>,
    /// Free-form note.
    pub notes: Option<String>,
    /// Scan time.
    pub scanned_at: DateTime<Utc>,
}
