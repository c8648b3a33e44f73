//! Shared DTO types used across multiple endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::EventStatus;

/// Body of `POST /events/{id}/status`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EventStatusChange {
    /// Target status.
    pub status: EventStatus,
}

/// Acknowledgement returned by delete endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeletedResponse {
    /// Identifier of the removed entity.
    pub id: uuid::Uuid,
    /// Always `true`.
    pub deleted: bool,
    /// Deletion timestamp.
    pub deleted_at: DateTime<Utc>,
}

impl DeletedResponse {
    /// Acknowledges the deletion of `id` now.
    #[must_use]
    pub fn now(id: uuid::Uuid) -> Self {
        Self {
            id,
            deleted: true,
            deleted_at: Utc::now(),
        }
    }
}
