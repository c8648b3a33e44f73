//! Registrations and their status state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, RegistrationId, UserId};
use crate::error::ApiError;

/// Ticket category chosen at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketType {
    /// Standard admission.
    Regular,
    /// VIP admission.
    Vip,
    /// Student admission.
    Student,
}

impl TicketType {
    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "REGULAR",
            Self::Vip => "VIP",
            Self::Student => "STUDENT",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration status.
///
/// ```text
/// PENDING ──► CONFIRMED
///    │
///    ├──────► PAYMENT_FAILED
///    └──────► CANCELLED
/// ```
///
/// Everything except `PENDING` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    /// Awaiting payment or confirmation.
    Pending,
    /// Paid or confirmed by an admin; a ticket exists.
    Confirmed,
    /// Withdrawn by the owner or an admin.
    Cancelled,
    /// Payment was declined or rejected.
    PaymentFailed,
}

impl RegistrationStatus {
    /// Returns `true` when `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Pending, Self::PaymentFailed)
        )
    }

    /// Returns `true` for states with no outgoing transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Active registrations count against capacity and block re-registration.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::PaymentFailed => "PAYMENT_FAILED",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            "PAYMENT_FAILED" => Ok(Self::PaymentFailed),
            other => Err(ApiError::InvalidRequest(format!(
                "unknown registration status: {other}"
            ))),
        }
    }
}

/// A user's signup for one event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Registration {
    /// Registration identifier.
    pub id: RegistrationId,
    /// Registrant.
    pub user_id: UserId,
    /// Target event.
    pub event_id: EventId,
    /// Ticket category.
    pub ticket_type: TicketType,
    /// Current status.
    pub status: RegistrationStatus,
    /// Ticket number, set once the registration is confirmed.
    pub ticket_number: Option<String>,
    /// Reference shared with the payment.
    pub payment_reference: String,
    /// Dietary, accessibility or other requests.
    pub special_requests: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Creates a `PENDING` registration.
    #[must_use]
    pub fn new(
        user_id: UserId,
        event_id: EventId,
        ticket_type: TicketType,
        payment_reference: String,
        special_requests: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RegistrationId::new(),
            user_id,
            event_id,
            ticket_type,
            status: RegistrationStatus::Pending,
            ticket_number: None,
            payment_reference,
            special_requests,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next` if the state machine allows it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidTransition`] for any move out of a
    /// terminal state or any other illegal pair.
    pub fn transition(&mut self, next: RegistrationStatus) -> Result<(), ApiError> {
        if !self.status.can_transition_to(next) {
            return Err(ApiError::InvalidTransition {
                entity: "registration",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
