//! Data Transfer Objects owned by the HTTP layer.
//!
//! Request and response bodies that map one-to-one onto a service type
//! live next to that service; this module holds the small envelopes only
//! the handlers need.

pub mod common_dto;

pub use common_dto::*;
