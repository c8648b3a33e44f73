//! In-memory state of the whole platform.
//!
//! [`Store`] keeps every entity in one [`StoreState`] behind a single
//! [`tokio::sync::RwLock`]. Services take the write lock for the full
//! duration of a multi-entity mutation (registration + payment + ticket,
//! webhook settlement, bank-transfer verification), so those mutations are
//! atomic and concurrent writers to the same registration are serialized.
//!
//! # Concurrency
//!
//! - Reads share the lock and run concurrently.
//! - Writes are serialized; no await point is held while the guard is
//!   alive except for the lock acquisition itself.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    AlumniProfile, Connection, ConnectionId, Event, EventId, Message, MessageId, Payment, PaymentId, Registration,
    RegistrationId, RegistrationStatus, ScanRecord, Ticket, TicketId, User, UserId,
};
use crate::error::ApiError;

/// All entities, keyed by id.
#[derive(Debug, Default)]
pub struct StoreState {
    /// Users upserted from token claims.
    pub users: HashMap<UserId, User>,
    /// Event catalogue.
    pub events: HashMap<EventId, Event>,
    /// Registrations.
    pub registrations: HashMap<RegistrationId, Registration>,
    /// Payments (one per registration).
    pub payments: HashMap<PaymentId, Payment>,
    /// Issued tickets (at most one per registration).
    pub tickets: HashMap<TicketId, Ticket>,
    /// Scan log in insertion order.
    pub scans: Vec<ScanRecord>,
    /// Alumni profiles keyed by owner.
    pub profiles: HashMap<UserId, AlumniProfile>,
    /// Messages.
    pub messages: HashMap<MessageId, Message>,
    /// Networking connections.
    pub connections: HashMap<ConnectionId, Connection>,
    /// Public site configuration.
    pub site_config: BTreeMap<String, serde_json::Value>,
}

impl StoreState {
    /// Looks up an event.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::EventNotFound`] if absent.
    pub fn event(&self, id: EventId) -> Result<&Event, ApiError> {
        self.events
            .get(&id)
            .ok_or(ApiError::EventNotFound(*id.as_uuid()))
    }

    /// Looks up an event for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::EventNotFound`] if absent.
    pub fn event_mut(&mut self, id: EventId) -> Result<&mut Event, ApiError> {
        self.events
            .get_mut(&id)
            .ok_or(ApiError::EventNotFound(*id.as_uuid()))
    }

    /// Looks up a registration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RegistrationNotFound`] if absent.
    pub fn registration(&self, id: RegistrationId) -> Result<&Registration, ApiError> {
        self.registrations
            .get(&id)
            .ok_or(ApiError::RegistrationNotFound(*id.as_uuid()))
    }

    /// Looks up a registration for mutation.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RegistrationNotFound`] if absent.
    pub fn registration_mut(
        &mut self,
        id: RegistrationId,
    ) -> Result<&mut Registration, ApiError> {
        self.registrations
            .get_mut(&id)
            .ok_or(ApiError::RegistrationNotFound(*id.as_uuid()))
    }

    /// Looks up a payment.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PaymentNotFound`] if absent.
    pub fn payment(&self, id: PaymentId) -> Result<&Payment, ApiError> {
        self.payments
            .get(&id)
            .ok_or_else(|| ApiError::PaymentNotFound(id.to_string()))
    }

    /// Active (`PENDING`/`CONFIRMED`) registration of `user` for `event`.
    #[must_use]
    pub fn active_registration(&self, user: UserId, event: EventId) -> Option<&Registration> {
        self.registrations
            .values()
            .find(|r| r.user_id == user && r.event_id == event && r.status.is_active())
    }

    /// Number of active registrations for `event`.
    #[must_use]
    pub fn active_registration_count(&self, event: EventId) -> u32 {
        let count = self
            .registrations
            .values()
            .filter(|r| r.event_id == event && r.status.is_active())
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Registrations of `event` in the given status.
    pub fn registrations_with_status(
        &self,
        event: EventId,
        status: RegistrationStatus,
    ) -> impl Iterator<Item = &Registration> {
        self.registrations
            .values()
            .filter(move |r| r.event_id == event && r.status == status)
    }

    /// Payment attached to a registration.
    #[must_use]
    pub fn payment_for_registration(&self, registration: RegistrationId) -> Option<&Payment> {
        self.payments
            .values()
            .find(|p| p.registration_id == registration)
    }

    /// Payment id for a gateway reference.
    #[must_use]
    pub fn payment_id_by_reference(&self, reference: &str) -> Option<PaymentId> {
        self.payments
            .values()
            .find(|p| p.reference == reference)
            .map(|p| p.id)
    }

    /// Ticket issued for a registration.
    #[must_use]
    pub fn ticket_for_registration(&self, registration: RegistrationId) -> Option<&Ticket> {
        self.tickets
            .values()
            .find(|t| t.registration_id == registration)
    }

    /// Ticket id for a printed ticket number (case-insensitive).
    #[must_use]
    pub fn ticket_id_by_number(&self, number: &str) -> Option<TicketId> {
        self.tickets
            .values()
            .find(|t| t.ticket_number.eq_ignore_ascii_case(number))
            .map(|t| t.id)
    }

    /// Most recent accepted scan of a ticket.
    #[must_use]
    pub fn last_scan(&self, ticket: TicketId) -> Option<&ScanRecord> {
        self.scans.iter().rev().find(|s| s.ticket_id == ticket)
    }
}

/// Shared handle to the platform state.
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<StoreState>,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the state for reading.
    pub async fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().await
    }

    /// Acquires the state for a (possibly multi-entity) mutation.
    pub async fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().await
    }
}
