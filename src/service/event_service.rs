//! Event service: catalogue CRUD, lifecycle, listing and statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{Outbox, Page, ServiceContext};
use crate::auth::AuthUser;
use crate::domain::{
    Activity, Event, EventId, EventStatus, EventView, PaymentStatus, RegistrationStatus,
    StoreState,
};
use crate::error::ApiError;
use crate::persistence::Record;

/// Default page size of event listings.
pub const DEFAULT_LIMIT: usize = 20;
/// Largest accepted page size.
pub const MAX_LIMIT: usize = 100;

/// Fields of a new event.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct EventInput {
    /// Title (1..=200 characters).
    pub title: String,
    /// Long description.
    pub description: Option<String>,
    /// Teaser.
    pub short_description: Option<String>,
    /// Start.
    pub start_date: DateTime<Utc>,
    /// End (after start).
    pub end_date: DateTime<Utc>,
    /// Venue name.
    pub venue: String,
    /// Street address.
    pub address: Option<String>,
    /// Capacity (> 0).
    pub capacity: u32,
    /// Regular price (>= 0).
    pub price: Decimal,
    /// Early-bird price.
    pub early_bird_price: Option<Decimal>,
    /// Early-bird cut-off.
    pub early_bird_deadline: Option<DateTime<Utc>>,
    /// Registration cut-off.
    pub registration_deadline: Option<DateTime<Utc>>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Hidden from the public catalogue.
    #[serde(default)]
    pub is_private: bool,
    /// Initial status; `DRAFT` or `PUBLISHED` (default `DRAFT`).
    pub status: Option<EventStatus>,
}

/// Partial update of an event; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EventPatch {
    /// Title.
    pub title: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Teaser.
    pub short_description: Option<String>,
    /// Start.
    pub start_date: Option<DateTime<Utc>>,
    /// End.
    pub end_date: Option<DateTime<Utc>>,
    /// Venue.
    pub venue: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Capacity.
    pub capacity: Option<u32>,
    /// Regular price.
    pub price: Option<Decimal>,
    /// Early-bird price.
    pub early_bird_price: Option<Decimal>,
    /// Early-bird cut-off.
    pub early_bird_deadline: Option<DateTime<Utc>>,
    /// Registration cut-off.
    pub registration_deadline: Option<DateTime<Utc>>,
    /// Tags (replaces the list).
    pub tags: Option<Vec<String>>,
    /// Privacy flag.
    pub is_private: Option<bool>,
}

/// Sort key of event listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventSort {
    /// By start date.
    #[default]
    StartDate,
    /// By creation time.
    CreatedAt,
    /// Alphabetically by title.
    Title,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Query string of `GET /events`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventQuery {
    /// Case-insensitive substring of title, description or venue.
    pub search: Option<String>,
    /// Comma-separated statuses (default `PUBLISHED,COMPLETED`).
    pub status: Option<String>,
    /// Comma-separated tags; an event matches if it has any of them.
    pub tags: Option<String>,
    /// Lowest current price.
    pub min_price: Option<Decimal>,
    /// Highest current price.
    pub max_price: Option<Decimal>,
    /// Earliest start date.
    pub start_from: Option<DateTime<Utc>>,
    /// Latest start date.
    pub start_to: Option<DateTime<Utc>>,
    /// Include events that already ended.
    #[serde(default)]
    pub show_past: bool,
    /// Include private events (admins only).
    #[serde(default)]
    pub show_private: bool,
    /// Sort key.
    #[serde(default)]
    #[param(inline)]
    pub sort_by: EventSort,
    /// Sort direction.
    #[serde(default)]
    #[param(inline)]
    pub sort_order: SortOrder,
    /// Items to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size (1..=100, default 20).
    pub limit: Option<usize>,
}

/// Parsed, validated listing filter.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Lower-cased search needle.
    pub search: Option<String>,
    /// Accepted statuses.
    pub statuses: Vec<EventStatus>,
    /// Lower-cased tags (any-of).
    pub tags: Vec<String>,
    /// Price range on the current price.
    pub min_price: Option<Decimal>,
    /// Price range on the current price.
    pub max_price: Option<Decimal>,
    /// Start-date range.
    pub start_from: Option<DateTime<Utc>>,
    /// Start-date range.
    pub start_to: Option<DateTime<Utc>>,
    /// Include ended events.
    pub show_past: bool,
    /// Include private events.
    pub show_private: bool,
    /// Sort key.
    pub sort_by: EventSort,
    /// Sort direction.
    pub sort_order: SortOrder,
}

impl EventFilter {
    /// Builds a filter from a query. Private events and non-public statuses
    /// are only available to admins.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for unknown statuses or an
    /// inverted range.
    pub fn from_query(query: &EventQuery, is_admin: bool) -> Result<Self, ApiError> {
        let mut statuses = match query.status.as_deref() {
            Some(raw) if !raw.trim().is_empty() => split_list(raw)
                .map(|s| s.parse::<EventStatus>())
                .collect::<Result<Vec<_>, _>>()?,
            _ => vec![EventStatus::Published, EventStatus::Completed],
        };
        if !is_admin {
            statuses.retain(|s| matches!(s, EventStatus::Published | EventStatus::Completed));
            if statuses.is_empty() {
                return Err(ApiError::Forbidden(
                    "only admins may list draft or cancelled events".to_string(),
                ));
            }
        }
        if let (Some(min), Some(max)) = (query.min_price, query.max_price)
            && min > max
        {
            return Err(ApiError::InvalidRequest(
                "min_price must not exceed max_price".to_string(),
            ));
        }
        if let (Some(from), Some(to)) = (query.start_from, query.start_to)
            && from > to
        {
            return Err(ApiError::InvalidRequest(
                "start_from must not be after start_to".to_string(),
            ));
        }
        Ok(Self {
            search: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            statuses,
            tags: query
                .tags
                .as_deref()
                .map(|raw| split_list(raw).map(str::to_lowercase).collect())
                .unwrap_or_default(),
            min_price: query.min_price,
            max_price: query.max_price,
            start_from: query.start_from,
            start_to: query.start_to,
            show_past: query.show_past,
            show_private: query.show_private && is_admin,
            sort_by: query.sort_by,
            sort_order: query.sort_order,
        })
    }

    /// Returns `true` if `event` passes every active filter.
    #[must_use]
    pub fn matches(&self, event: &Event, now: DateTime<Utc>) -> bool {
        if !self.statuses.contains(&event.status) {
            return false;
        }
        if event.is_private && !self.show_private {
            return false;
        }
        if !self.show_past && event.is_past(now) {
            return false;
        }
        if let Some(needle) = &self.search {
            let hit = event.title.to_lowercase().contains(needle)
                || event.venue.to_lowercase().contains(needle)
                || event
                    .description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(needle));
            if !hit {
                return false;
            }
        }
        if !self.tags.is_empty()
            && !event
                .tags
                .iter()
                .any(|t| self.tags.contains(&t.to_lowercase()))
        {
            return false;
        }
        let price = event.current_price(now);
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        if self.start_from.is_some_and(|from| event.start_date < from) {
            return false;
        }
        if self.start_to.is_some_and(|to| event.start_date > to) {
            return false;
        }
        true
    }

    /// Filters and sorts `events`.
    #[must_use]
    pub fn apply<'a>(
        &self,
        events: impl Iterator<Item = &'a Event>,
        now: DateTime<Utc>,
    ) -> Vec<&'a Event> {
        let mut hits: Vec<&Event> = events.filter(|e| self.matches(e, now)).collect();
        hits.sort_by(|a, b| {
            let ord = match self.sort_by {
                EventSort::StartDate => a.start_date.cmp(&b.start_date),
                EventSort::CreatedAt => a.created_at.cmp(&b.created_at),
                EventSort::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            }
            .then_with(|| a.id.cmp(&b.id));
            match self.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        hits
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Per-event dashboard numbers.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventStats {
    /// Event identifier.
    pub event_id: EventId,
    /// Capacity.
    pub capacity: u32,
    /// All registrations ever made.
    pub total_registrations: usize,
    /// Confirmed registrations.
    pub confirmed: usize,
    /// Pending registrations.
    pub pending: usize,
    /// Cancelled registrations.
    pub cancelled: usize,
    /// Registrations whose payment failed.
    pub payment_failed: usize,
    /// Remaining capacity.
    pub available_spots: u32,
    /// Sum of completed payments.
    pub revenue: Decimal,
    /// Tickets checked in at least once.
    pub checked_in: usize,
    /// Active registrations per ticket type.
    pub by_ticket_type: BTreeMap<String, usize>,
}

/// Catalogue-wide numbers, cached for a short time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogueOverview {
    /// Events in the catalogue.
    pub total_events: usize,
    /// Published events.
    pub published_events: usize,
    /// Published events that have not started.
    pub upcoming_events: usize,
    /// Active registrations across all events.
    pub active_registrations: usize,
    /// Distinct tags across public events.
    pub tags: Vec<String>,
    /// When the numbers were computed.
    pub computed_at: DateTime<Utc>,
}

/// Event catalogue operations.
#[derive(Debug, Clone)]
pub struct EventService {
    ctx: ServiceContext,
}

impl EventService {
    /// Creates a new `EventService`.
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Creates an event.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins and
    /// [`ApiError::InvalidRequest`] for invalid fields.
    pub async fn create(&self, admin: &AuthUser, input: EventInput) -> Result<EventView, ApiError> {
        admin.require_admin()?;
        let status = input.status.unwrap_or(EventStatus::Draft);
        if !matches!(status, EventStatus::Draft | EventStatus::Published) {
            return Err(ApiError::InvalidRequest(
                "new events must be DRAFT or PUBLISHED".to_string(),
            ));
        }
        let now = Utc::now();
        let event = Event {
            id: EventId::new(),
            title: input.title.trim().to_string(),
            description: input.description,
            short_description: input.short_description,
            start_date: input.start_date,
            end_date: input.end_date,
            venue: input.venue.trim().to_string(),
            address: input.address,
            capacity: input.capacity,
            price: input.price,
            early_bird_price: input.early_bird_price,
            early_bird_deadline: input.early_bird_deadline,
            registration_deadline: input.registration_deadline,
            status,
            tags: normalize_tags(input.tags),
            is_private: input.is_private,
            created_at: now,
            updated_at: now,
        };
        event.validate()?;

        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        state.events.insert(event.id, event.clone());
        outbox.save(Record::Event(event.clone()));
        outbox.publish(Activity::EventUpdated {
            event_id: event.id,
            status: event.status,
            timestamp: now,
        });
        self.ctx.commit(state, outbox).await;

        tracing::info!(event_id = %event.id, title = %event.title, status = %event.status, "event created");
        Ok(event.view(0, now))
    }

    /// Applies a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::EventNotFound`], [`ApiError::Forbidden`], or
    /// [`ApiError::InvalidRequest`] if the result is invalid or the
    /// capacity drops below the active registrations.
    pub async fn update(
        &self,
        admin: &AuthUser,
        id: EventId,
        patch: EventPatch,
    ) -> Result<EventView, ApiError> {
        admin.require_admin()?;
        let now = Utc::now();
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let view = {
            let active = state.active_registration_count(id);
            let current = state.event(id)?;
            if matches!(current.status, EventStatus::Cancelled | EventStatus::Completed) {
                return Err(ApiError::Conflict(format!(
                    "event {id} is {} and can no longer be edited",
                    current.status
                )));
            }
            let mut next = current.clone();
            apply_patch(&mut next, patch);
            next.validate()?;
            if next.capacity < active {
                return Err(ApiError::InvalidRequest(format!(
                    "capacity {} is below the {active} active registrations",
                    next.capacity
                )));
            }
            next.updated_at = now;
            state.events.insert(id, next.clone());
            outbox.save(Record::Event(next.clone()));
            outbox.publish(Activity::EventUpdated {
                event_id: id,
                status: next.status,
                timestamp: now,
            });
            next.view(active, now)
        };
        self.ctx.commit(state, outbox).await;
        tracing::info!(event_id = %id, "event updated");
        Ok(view)
    }

    /// Moves an event through its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidTransition`] for illegal moves and
    /// [`ApiError::InvalidRequest`] when publishing an invalid event.
    pub async fn change_status(
        &self,
        admin: &AuthUser,
        id: EventId,
        next: EventStatus,
    ) -> Result<EventView, ApiError> {
        admin.require_admin()?;
        let now = Utc::now();
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let view = {
            let active = state.active_registration_count(id);
            let event = state.event_mut(id)?;
            if next == EventStatus::Published {
                event.validate()?;
            }
            let from = event.status;
            event.transition(next)?;
            outbox.save(Record::Event(event.clone()));
            outbox.publish(Activity::EventUpdated {
                event_id: id,
                status: next,
                timestamp: now,
            });
            tracing::info!(event_id = %id, %from, to = %next, "event status changed");
            event.view(active, now)
        };
        self.ctx.commit(state, outbox).await;
        Ok(view)
    }

    /// Deletes a draft event that never had registrations.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Conflict`] for non-draft events or events with
    /// registrations.
    pub async fn delete(&self, admin: &AuthUser, id: EventId) -> Result<(), ApiError> {
        admin.require_admin()?;
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        {
            let event = state.event(id)?;
            if event.status != EventStatus::Draft {
                return Err(ApiError::Conflict(format!(
                    "only DRAFT events can be deleted; event {id} is {}",
                    event.status
                )));
            }
            if state.registrations.values().any(|r| r.event_id == id) {
                return Err(ApiError::Conflict(format!(
                    "event {id} has registrations"
                )));
            }
        }
        state.events.remove(&id);
        outbox.delete("event", id.to_string());
        outbox.publish(Activity::EventDeleted {
            event_id: id,
            timestamp: Utc::now(),
        });
        self.ctx.commit(state, outbox).await;
        tracing::info!(event_id = %id, "draft event deleted");
        Ok(())
    }

    /// Returns one event. Drafts, cancelled and private events are only
    /// visible to admins; everyone else gets a not-found.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::EventNotFound`].
    pub async fn get(&self, viewer: Option<&AuthUser>, id: EventId) -> Result<EventView, ApiError> {
        let is_admin = viewer.is_some_and(AuthUser::is_admin);
        let state = self.ctx.store.read().await;
        let event = state.event(id)?;
        let public = matches!(event.status, EventStatus::Published | EventStatus::Completed)
            && !event.is_private;
        if !public && !is_admin {
            return Err(ApiError::EventNotFound(*id.as_uuid()));
        }
        Ok(event.view(state.active_registration_count(id), Utc::now()))
    }

    /// Filters, sorts and paginates the catalogue.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for an invalid query.
    pub async fn list(
        &self,
        viewer: Option<&AuthUser>,
        query: &EventQuery,
    ) -> Result<Page<EventView>, ApiError> {
        let filter = EventFilter::from_query(query, viewer.is_some_and(AuthUser::is_admin))?;
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let now = Utc::now();
        let state = self.ctx.store.read().await;
        let views: Vec<EventView> = filter
            .apply(state.events.values(), now)
            .into_iter()
            .map(|e| e.view(state.active_registration_count(e.id), now))
            .collect();
        Ok(Page::slice(views, query.offset, limit))
    }

    /// Per-event statistics for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::EventNotFound`] or [`ApiError::Forbidden`].
    pub async fn stats(&self, staff: &AuthUser, id: EventId) -> Result<EventStats, ApiError> {
        staff.require_staff()?;
        let state = self.ctx.store.read().await;
        event_stats(&state, id)
    }

    /// Catalogue-wide overview, served from the TTL cache when fresh.
    pub async fn overview(&self) -> CatalogueOverview {
        if let Some(cached) = self.ctx.overview.get().await {
            return cached;
        }
        let now = Utc::now();
        let state = self.ctx.store.read().await;
        let overview = {
            let mut tags: Vec<String> = state
                .events
                .values()
                .filter(|e| e.status == EventStatus::Published && !e.is_private)
                .flat_map(|e| e.tags.iter().cloned())
                .collect();
            tags.sort();
            tags.dedup();
            CatalogueOverview {
                total_events: state.events.len(),
                published_events: state
                    .events
                    .values()
                    .filter(|e| e.status == EventStatus::Published)
                    .count(),
                upcoming_events: state
                    .events
                    .values()
                    .filter(|e| e.status == EventStatus::Published && e.start_date > now)
                    .count(),
                active_registrations: state
                    .registrations
                    .values()
                    .filter(|r| r.status.is_active())
                    .count(),
                tags,
                computed_at: now,
            }
        };
        // Must land while the read guard is held; commits invalidate
        // under the write guard.
        self.ctx.overview.put(overview.clone()).await;
        drop(state);
        overview
    }
}

/// Computes [`EventStats`] from a state snapshot.
///
/// # Errors
///
/// Returns [`ApiError::EventNotFound`].
pub fn event_stats(state: &StoreState, id: EventId) -> Result<EventStats, ApiError> {
    let event = state.event(id)?;
    let regs: Vec<_> = state
        .registrations
        .values()
        .filter(|r| r.event_id == id)
        .collect();
    let count = |status: RegistrationStatus| regs.iter().filter(|r| r.status == status).count();
    let mut by_ticket_type = BTreeMap::new();
    for reg in regs.iter().filter(|r| r.status.is_active()) {
        *by_ticket_type
            .entry(reg.ticket_type.as_str().to_string())
            .or_insert(0_usize) += 1;
    }
    let revenue = regs
        .iter()
        .filter_map(|r| state.payment_for_registration(r.id))
        .filter(|p| p.status == PaymentStatus::Completed)
        .map(|p| p.amount)
        .sum();
    let checked_in = state
        .tickets
        .values()
        .filter(|t| t.event_id == id && t.checked_in)
        .count();
    let active = state.active_registration_count(id);
    Ok(EventStats {
        event_id: id,
        capacity: event.capacity,
        total_registrations: regs.len(),
        confirmed: count(RegistrationStatus::Confirmed),
        pending: count(RegistrationStatus::Pending),
        cancelled: count(RegistrationStatus::Cancelled),
        payment_failed: count(RegistrationStatus::PaymentFailed),
        available_spots: event.capacity.saturating_sub(active),
        revenue,
        checked_in,
        by_ticket_type,
    })
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn apply_patch(event: &mut Event, patch: EventPatch) {
    if let Some(title) = patch.title {
        event.title = title.trim().to_string();
    }
    if let Some(v) = patch.description {
        event.description = Some(v);
    }
    if let Some(v) = patch.short_description {
        event.short_description = Some(v);
    }
    if let Some(v) = patch.start_date {
        event.start_date = v;
    }
    if let Some(v) = patch.end_date {
        event.end_date = v;
    }
    if let Some(v) = patch.venue {
        event.venue = v.trim().to_string();
    }
    if let Some(v) = patch.address {
        event.address = Some(v);
    }
    if let Some(v) = patch.capacity {
        event.capacity = v;
    }
    if let Some(v) = patch.price {
        event.price = v;
    }
    if let Some(v) = patch.early_bird_price {
        event.early_bird_price = Some(v);
    }
    if let Some(v) = patch.early_bird_deadline {
        event.early_bird_deadline = Some(v);
    }
    if let Some(v) = patch.registration_deadline {
        event.registration_deadline = Some(v);
    }
    if let Some(v) = patch.tags {
        event.tags = normalize_tags(v);
    }
    if let Some(v) = patch.is_private {
        event.is_private = v;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::domain::Role;
    use crate::domain::event::tests::sample_event;
    use crate::service::test_support::{context, user};

    fn service() -> EventService {
        EventService::new(context())
    }

    fn input(title: &str) -> EventInput {
        let start = Utc::now() + ChronoDuration::days(20);
        EventInput {
            title: title.to_string(),
            description: None,
            short_description: None,
            start_date: start,
            end_date: start + ChronoDuration::hours(6),
            venue: "Hall".to_string(),
            address: None,
            capacity: 50,
            price: Decimal::from(5_000),
            early_bird_price: None,
            early_bird_deadline: None,
            registration_deadline: None,
            tags: vec!["Gala".to_string(), "gala".to_string()],
            is_private: false,
            status: Some(EventStatus::Published),
        }
    }

    #[test]
    fn filter_is_the_and_of_all_active_filters() {
        let now = Utc::now();
        let mut a = sample_event();
        a.title = "Lagos Gala Night".to_string();
        a.tags = vec!["gala".to_string()];
        a.early_bird_price = None;
        a.price = Decimal::from(10_000);

        let mut b = a.clone();
        b.id = EventId::new();
        b.title = "Abuja Gala Night".to_string();
        b.price = Decimal::from(50_000);

        let mut c = a.clone();
        c.id = EventId::new();
        c.title = "Lagos Golf Day".to_string();
        c.tags = vec!["sports".to_string()];

        let query = EventQuery {
            search: Some("lagos".to_string()),
            tags: Some("gala, music".to_string()),
            max_price: Some(Decimal::from(20_000)),
            ..EventQuery::default()
        };
        let Ok(filter) = EventFilter::from_query(&query, false) else {
            panic!("valid query");
        };
        let events = [a.clone(), b, c];
        let hits = filter.apply(events.iter(), now);
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|e| e.id == a.id));
        for event in &events {
            let expected = event.title.to_lowercase().contains("lagos")
                && event.tags.iter().any(|t| t == "gala")
                && event.current_price(now) <= Decimal::from(20_000);
            assert_eq!(filter.matches(event, now), expected, "{}", event.title);
        }
    }

    #[test]
    fn public_filter_hides_private_and_past_events() {
        let now = Utc::now();
        let mut private = sample_event();
        private.is_private = true;
        let mut past = sample_event();
        past.start_date = now - ChronoDuration::days(3);
        past.end_date = now - ChronoDuration::days(2);

        let query = EventQuery {
            show_private: true,
            ..EventQuery::default()
        };
        let Ok(public) = EventFilter::from_query(&query, false) else {
            panic!("valid query");
        };
        assert!(!public.matches(&private, now));
        assert!(!public.matches(&past, now));

        let Ok(admin) = EventFilter::from_query(&query, true) else {
            panic!("valid query");
        };
        assert!(admin.matches(&private, now));
    }

    #[test]
    fn non_admin_cannot_list_drafts() {
        let query = EventQuery {
            status: Some("DRAFT".to_string()),
            ..EventQuery::default()
        };
        assert!(matches!(
            EventFilter::from_query(&query, false),
            Err(ApiError::Forbidden(_))
        ));
        assert!(EventFilter::from_query(&query, true).is_ok());
    }

    #[test]
    fn sort_by_title_desc() {
        let now = Utc::now();
        let mut a = sample_event();
        a.title = "alpha".to_string();
        let mut b = sample_event();
        b.title = "Bravo".to_string();
        let query = EventQuery {
            sort_by: EventSort::Title,
            sort_order: SortOrder::Desc,
            ..EventQuery::default()
        };
        let Ok(filter) = EventFilter::from_query(&query, false) else {
            panic!("valid query");
        };
        let events = [a, b];
        let titles: Vec<&str> = filter
            .apply(events.iter(), now)
            .iter()
            .map(|e| e.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Bravo", "alpha"]);
    }

    #[tokio::test]
    async fn create_requires_admin_and_normalizes_tags() {
        let svc = service();
        assert!(matches!(
            svc.create(&user(Role::Member), input("Gala")).await,
            Err(ApiError::Forbidden(_))
        ));
        let Ok(view) = svc.create(&user(Role::Admin), input("Gala")).await else {
            panic!("create failed");
        };
        assert_eq!(view.event.tags, vec!["gala".to_string()]);
        assert_eq!(view.available_spots, 50);
    }

    #[tokio::test]
    async fn list_paginates_with_has_more() {
        let svc = service();
        let admin = user(Role::Admin);
        for i in 0..5 {
            assert!(svc.create(&admin, input(&format!("Event {i}"))).await.is_ok());
        }
        let query = EventQuery {
            limit: Some(2),
            offset: 2,
            ..EventQuery::default()
        };
        let Ok(page) = svc.list(None, &query).await else {
            panic!("list failed");
        };
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn drafts_are_hidden_and_deletable() {
        let svc = service();
        let admin = user(Role::Admin);
        let mut draft = input("Draft");
        draft.status = None;
        let Ok(view) = svc.create(&admin, draft).await else {
            panic!("create failed");
        };
        let id = view.event.id;
        assert!(matches!(
            svc.get(None, id).await,
            Err(ApiError::EventNotFound(_))
        ));
        assert!(svc.get(Some(&admin), id).await.is_ok());
        assert!(svc.delete(&admin, id).await.is_ok());
        assert!(svc.get(Some(&admin), id).await.is_err());
    }

    #[tokio::test]
    async fn published_event_cannot_be_deleted_or_reopened() {
        let svc = service();
        let admin = user(Role::Admin);
        let Ok(view) = svc.create(&admin, input("Live")).await else {
            panic!("create failed");
        };
        let id = view.event.id;
        assert!(matches!(
            svc.delete(&admin, id).await,
            Err(ApiError::Conflict(_))
        ));
        assert!(svc.change_status(&admin, id, EventStatus::Cancelled).await.is_ok());
        assert!(matches!(
            svc.change_status(&admin, id, EventStatus::Published).await,
            Err(ApiError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn overview_is_cached_until_mutation() {
        let svc = service();
        let admin = user(Role::Admin);
        assert_eq!(svc.overview().await.total_events, 0);
        {
            let mut state = svc.ctx.store.write().await;
            let event = sample_event();
            state.events.insert(event.id, event);
        }
        assert_eq!(svc.overview().await.total_events, 0);
        assert!(svc.create(&admin, input("New")).await.is_ok());
        assert_eq!(svc.overview().await.total_events, 2);
    }

    #[tokio::test]
    async fn overview_follows_registration_changes() {
        use std::sync::Arc;

        use crate::domain::{BadgeSigner, TicketType};
        use crate::service::registration_service::{CreateRegistration, RegistrationService};

        let ctx = context();
        let svc = EventService::new(ctx.clone());
        let registrations = RegistrationService::new(
            ctx.clone(),
            Arc::new(BadgeSigner::new("qr-secret")),
            "NGN".to_string(),
            "ALU".to_string(),
        );
        let event = sample_event();
        let event_id = event.id;
        ctx.store.write().await.events.insert(event_id, event);
        ctx.overview.invalidate().await;
        assert_eq!(svc.overview().await.active_registrations, 0);

        let member = user(Role::Member);
        let Ok(receipt) = registrations
            .create(
                &member,
                CreateRegistration {
                    event_id,
                    ticket_type: TicketType::Regular,
                    special_requests: None,
                },
            )
            .await
        else {
            panic!("registration failed");
        };
        assert_eq!(svc.overview().await.active_registrations, 1);

        assert!(
            registrations
                .cancel(&member, receipt.registration.id)
                .await
                .is_ok()
        );
        assert_eq!(svc.overview().await.active_registrations, 0);
    }
}
