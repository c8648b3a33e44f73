//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The endpoint at `/ws` streams live activities (registrations,
//! payments, tickets, scans) to organizers and admins, filtered by the
//! events each client subscribes to.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
