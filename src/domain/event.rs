//! Event catalogue entity and its lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::EventId;
use crate::error::ApiError;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Publication status of an event.
///
/// Lifecycle: `DRAFT → PUBLISHED | CANCELLED`, `PUBLISHED → CANCELLED |
/// COMPLETED`. `CANCELLED` and `COMPLETED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Being prepared; invisible to the public.
    Draft,
    /// Open for viewing and registration.
    Published,
    /// Called off.
    Cancelled,
    /// Took place.
    Completed,
}

impl EventStatus {
    /// Returns `true` when `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Published)
                | (Self::Draft, Self::Cancelled)
                | (Self::Published, Self::Cancelled)
                | (Self::Published, Self::Completed)
        )
    }

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "PUBLISHED" => Ok(Self::Published),
            "CANCELLED" => Ok(Self::Cancelled),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(ApiError::InvalidRequest(format!(
                "unknown event status: {other}"
            ))),
        }
    }
}

/// An event in the catalogue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Title (1..=200 characters).
    pub title: String,
    /// Long description.
    pub description: Option<String>,
    /// Teaser shown on cards.
    pub short_description: Option<String>,
    /// Start of the event.
    pub start_date: DateTime<Utc>,
    /// End of the event (after `start_date`).
    pub end_date: DateTime<Utc>,
    /// Venue name.
    pub venue: String,
    /// Street address.
    pub address: Option<String>,
    /// Maximum number of active registrations.
    pub capacity: u32,
    /// Regular ticket price.
    pub price: Decimal,
    /// Discounted price before `early_bird_deadline`.
    pub early_bird_price: Option<Decimal>,
    /// Early-bird cut-off (before `start_date`).
    pub early_bird_deadline: Option<DateTime<Utc>>,
    /// Registrations close at this instant (defaults to `start_date`).
    pub registration_deadline: Option<DateTime<Utc>>,
    /// Publication status.
    pub status: EventStatus,
    /// Free-form tags used for filtering.
    pub tags: Vec<String>,
    /// Hidden from the public catalogue.
    pub is_private: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Checks field-level invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] describing the first violated rule.
    pub fn validate(&self) -> Result<(), ApiError> {
        let title_len = self.title.trim().chars().count();
        if title_len == 0 || title_len > MAX_TITLE_LEN {
            return Err(ApiError::InvalidRequest(format!(
                "title must be 1..={MAX_TITLE_LEN} characters"
            )));
        }
        if self.venue.trim().is_empty() {
            return Err(ApiError::InvalidRequest("venue is required".to_string()));
        }
        if self.end_date <= self.start_date {
            return Err(ApiError::InvalidRequest(
                "end_date must be after start_date".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(ApiError::InvalidRequest(
                "capacity must be positive".to_string(),
            ));
        }
        if self.price.is_sign_negative() {
            return Err(ApiError::InvalidRequest(
                "price cannot be negative".to_string(),
            ));
        }
        if let Some(early) = self.early_bird_price {
            if early.is_sign_negative() || early > self.price {
                return Err(ApiError::InvalidRequest(
                    "early_bird_price must be between 0 and price".to_string(),
                ));
            }
        }
        if let Some(deadline) = self.early_bird_deadline
            && deadline >= self.start_date
        {
            return Err(ApiError::InvalidRequest(
                "early_bird_deadline must be before start_date".to_string(),
            ));
        }
        if let Some(deadline) = self.registration_deadline
            && deadline > self.start_date
        {
            return Err(ApiError::InvalidRequest(
                "registration_deadline must not be after start_date".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies a status change if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidTransition`] for illegal moves.
    pub fn transition(&mut self, next: EventStatus) -> Result<(), ApiError> {
        if !self.status.can_transition_to(next) {
            return Err(ApiError::InvalidTransition {
                entity: "event",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns `true` while the early-bird price applies.
    #[must_use]
    pub fn is_early_bird(&self, now: DateTime<Utc>) -> bool {
        self.early_bird_price.is_some() && self.early_bird_deadline.is_some_and(|d| now < d)
    }

    /// Price charged for a registration made at `now`.
    #[must_use]
    pub fn current_price(&self, now: DateTime<Utc>) -> Decimal {
        match self.early_bird_price {
            Some(early) if self.is_early_bird(now) => early,
            _ => self.price,
        }
    }

    /// Returns `true` while new registrations are accepted by date.
    #[must_use]
    pub fn is_registration_open(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Published
            && now < self.start_date
            && self.registration_deadline.is_none_or(|d| now < d)
    }

    /// Returns `true` once the event has ended.
    #[must_use]
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.end_date < now
    }

    /// Builds the read model with computed fields.
    #[must_use]
    pub fn view(&self, registration_count: u32, now: DateTime<Utc>) -> EventView {
        let available_spots = self.capacity.saturating_sub(registration_count);
        let seconds_until = (self.start_date - now).num_seconds();
        let days_until_event = if seconds_until <= 0 {
            seconds_until / 86_400
        } else {
            (seconds_until + 86_399) / 86_400
        };
        EventView {
            event: self.clone(),
            registration_count,
            available_spots,
            is_early_bird: self.is_early_bird(now),
            current_price: self.current_price(now),
            is_registration_open: self.is_registration_open(now) && available_spots > 0,
            is_sold_out: available_spots == 0,
            is_past_event: self.is_past(now),
            days_until_event,
        }
    }
}

/// Event plus computed, time-dependent fields.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventView {
    /// Stored event fields.
    #[serde(flatten)]
    pub event: Event,
    /// Active (pending + confirmed) registrations.
    pub registration_count: u32,
    /// Remaining capacity.
    pub available_spots: u32,
    /// Early-bird price currently applies.
    pub is_early_bird: bool,
    /// Price a registration made now would pay.
    pub current_price: Decimal,
    /// New registrations are accepted.
    pub is_registration_open: bool,
    /// No capacity left.
    pub is_sold_out: bool,
    /// Event already ended.
    pub is_past_event: bool,
    /// Whole days until start (negative once started).
    pub days_until_event: i64,
}
