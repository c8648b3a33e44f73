//! Domain activities reflecting state mutations.
//!
//! Every mutation emits an [`Activity`] through the [`super::ActivityBus`].
//! Activities are broadcast to WebSocket subscribers and optionally
//! persisted to the PostgreSQL activity log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{
    EventId, EventStatus, PaymentId, PaymentStatus, RegistrationId, RegistrationStatus, ScanType,
    TicketId, UserId,
};

/// Activity emitted after every state mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "activity_type", rename_all = "snake_case")]
pub enum Activity {
    /// An event was created or edited.
    EventUpdated {
        /// Event identifier.
        event_id: EventId,
        /// Status after the change.
        status: EventStatus,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A draft event was deleted.
    EventDeleted {
        /// Event identifier.
        event_id: EventId,
        /// Deletion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A user registered for an event.
    RegistrationCreated {
        /// Event identifier.
        event_id: EventId,
        /// Registration identifier.
        registration_id: RegistrationId,
        /// Registrant.
        user_id: UserId,
        /// Amount owed.
        amount: Decimal,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A registration changed status.
    RegistrationStatusChanged {
        /// Event identifier.
        event_id: EventId,
        /// Registration identifier.
        registration_id: RegistrationId,
        /// Previous status.
        from: RegistrationStatus,
        /// New status.
        to: RegistrationStatus,
        /// Who or what caused the change (`"webhook"`, `"admin"`, `"owner"`).
        source: &'static str,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A payment changed status.
    PaymentUpdated {
        /// Event identifier.
        event_id: EventId,
        /// Payment identifier.
        payment_id: PaymentId,
        /// Payment reference.
        reference: String,
        /// New status.
        status: PaymentStatus,
        /// Change timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A ticket was issued for a confirmed registration.
    TicketIssued {
        /// Event identifier.
        event_id: EventId,
        /// Ticket identifier.
        ticket_id: TicketId,
        /// Printed ticket number.
        ticket_number: String,
        /// Issue timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A badge was scanned at the door.
    BadgeScanned {
        /// Event identifier.
        event_id: EventId,
        /// Ticket identifier.
        ticket_id: TicketId,
        /// Direction.
        scan_type: ScanType,
        /// Door or desk name.
        scan_location: String,
        /// Accepted scans so far for this ticket.
        scan_count: u32,
        /// Scan timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl Activity {
    /// Returns the event this activity belongs to.
    #[must_use]
    pub fn event_id(&self) -> EventId {
        match self {
            Self::EventUpdated { event_id, .. }
            | Self::EventDeleted { event_id, .. }
            | Self::RegistrationCreated { event_id, .. }
            | Self::RegistrationStatusChanged { event_id, .. }
            | Self::PaymentUpdated { event_id, .. }
            | Self::TicketIssued { event_id, .. }
            | Self::BadgeScanned { event_id, .. } => *event_id,
        }
    }

    /// Returns the activity type as a static string slice.
    #[must_use]
    pub const fn activity_type_str(&self) -> &'static str {
        match self {
            Self::EventUpdated { .. } => "event_updated",
            Self::EventDeleted { .. } => "event_deleted",
            Self::RegistrationCreated { .. } => "registration_created",
            Self::RegistrationStatusChanged { .. } => "registration_status_changed",
            Self::PaymentUpdated { .. } => "payment_updated",
            Self::TicketIssued { .. } => "ticket_issued",
            Self::BadgeScanned { .. } => "badge_scanned",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_activity_serializes_with_tag() {
        let activity = Activity::BadgeScanned {
            event_id: EventId::new(),
            ticket_id: TicketId::new(),
            scan_type: ScanType::Checkin,
            scan_location: "main_entrance".to_string(),
            scan_count: 1,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&activity).unwrap_or_default();
        assert!(json.contains("\"activity_type\":\"badge_scanned\""));
        assert!(json.contains("CHECKIN"));
        assert_eq!(activity.activity_type_str(), "badge_scanned");
    }

    #[test]
    fn event_id_accessor() {
        let id = EventId::new();
        let activity = Activity::EventDeleted {
            event_id: id,
            timestamp: Utc::now(),
        };
        assert_eq!(activity.event_id(), id);
    }
}
