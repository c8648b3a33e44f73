//! Persistence layer: PostgreSQL entity records and activity log.
//!
//! The in-memory [`crate::domain::Store`] is authoritative while the
//! process runs. Every mutation is written through a bounded channel to
//! the `records` table, and the store is rebuilt from it on startup.

pub mod models;
pub mod postgres;
pub mod worker;

pub use models::Record;
pub use postgres::PostgresPersistence;
pub use worker::PersistenceHandle;
