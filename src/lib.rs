//! # alumni-hub
//!
//! REST API and live activity feed for an alumni association: event
//! catalogue, registrations, card and bank-transfer payments, tickets
//! with signed QR badges, door check-in, the alumni directory with member
//! connections and the admin dashboards around them.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)      ── bearer JWT (auth/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── Services (service/)       ── Paystack client (gateway/)
//!     ├── ActivityBus (domain/)
//!     │
//!     ├── Store (domain/)           one RwLock over every entity
//!     │
//!     └── PostgreSQL Persistence    write-through records + activity log
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod persistence;
pub mod service;
pub mod ws;
