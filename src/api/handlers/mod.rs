//! REST endpoint handlers organized by resource.

pub mod account;
pub mod admin;
pub mod alumni;
pub mod checkin;
pub mod events;
pub mod networking;
pub mod payments;
pub mod registrations;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(events::routes())
        .merge(registrations::routes())
        .merge(payments::routes())
        .merge(checkin::routes())
        .merge(alumni::routes())
        .merge(networking::routes())
        .merge(account::routes())
        .merge(admin::routes())
}
