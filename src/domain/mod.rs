//! Domain layer: entities, lifecycles, the in-memory store and the
//! activity bus.
//!
//! Entities own their invariants (`validate`, `transition`); the
//! [`Store`] holds them all behind one lock, and every mutation publishes
//! an [`Activity`] through the [`ActivityBus`].

pub mod activity;
pub mod activity_bus;
pub mod alumni;
pub mod cache;
pub mod connection;
pub mod event;
pub mod ids;
pub mod message;
pub mod payment;
pub mod registration;
pub mod scan;
pub mod store;
pub mod ticket;
pub mod user;

pub use activity::Activity;
pub use activity_bus::ActivityBus;
pub use alumni::{AlumniProfile, Squadron};
pub use cache::TtlCache;
pub use connection::{Connection, ConnectionStatus};
pub use event::{Event, EventStatus, EventView};
pub use ids::{
    ConnectionId, EventId, MessageId, PaymentId, RegistrationId, ScanId, TicketId, UserId,
};
pub use message::{Message, MessageKind, MessageStatus};
pub use payment::{BankTransferDetails, Payment, PaymentMethod, PaymentStatus};
pub use registration::{Registration, RegistrationStatus, TicketType};
pub use scan::{ScanRecord, ScanType};
pub use store::{Store, StoreState};
pub use ticket::{BadgeCode, BadgeSigner, BadgeType, QrPayload, Ticket};
pub use user::{Role, User};
