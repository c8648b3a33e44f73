//! Service layer: business logic orchestration.
//!
//! Every mutating method follows the same pattern: take the store write
//! lock → validate and mutate through the entity lifecycles → collect the
//! changed entities and activities in an [`Outbox`] → hand the guard and
//! the outbox to [`ServiceContext::commit`], which queues the changes
//! before the lock is released.

pub mod account_service;
pub mod admin_service;
pub mod checkin_service;
pub mod directory_service;
pub mod event_service;
pub mod message_service;
pub mod networking_service;
pub mod payment_service;
pub mod registration_service;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLockWriteGuard;

use crate::domain::{Activity, ActivityBus, Store, StoreState, TtlCache};
use crate::persistence::{PersistenceHandle, Record};

pub use account_service::AccountService;
pub use admin_service::AdminService;
pub use checkin_service::CheckinService;
pub use directory_service::DirectoryService;
pub use event_service::{CatalogueOverview, EventService};
pub use message_service::MessageService;
pub use networking_service::NetworkingService;
pub use payment_service::PaymentService;
pub use registration_service::RegistrationService;

/// Dependencies shared by every service.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    /// In-memory platform state.
    pub store: Arc<Store>,
    /// Live activity feed.
    pub bus: ActivityBus,
    /// Write-through persistence.
    pub persistence: PersistenceHandle,
    /// Catalogue overview, dropped on every event or registration change.
    pub overview: Arc<TtlCache<CatalogueOverview>>,
}

impl ServiceContext {
    /// Creates a context whose overview cache lives for `overview_ttl`.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        bus: ActivityBus,
        persistence: PersistenceHandle,
        overview_ttl: Duration,
    ) -> Self {
        Self {
            store,
            bus,
            persistence,
            overview: Arc::new(TtlCache::new(overview_ttl)),
        }
    }

    /// Persists and publishes everything collected in `outbox`, then
    /// releases `state`.
    ///
    /// Changes are queued while the write guard is still held, so the
    /// writer sees them in the same order the store applied them.
    pub async fn commit(&self, state: RwLockWriteGuard<'_, StoreState>, outbox: Outbox) {
        if outbox.touches_catalogue() {
            self.overview.invalidate().await;
        }
        for record in outbox.records {
            self.persistence.save(record).await;
        }
        for (kind, id) in outbox.deletes {
            self.persistence.delete(kind, id).await;
        }
        for activity in outbox.activities {
            let _ = self.bus.publish(activity);
        }
        drop(state);
    }
}

/// Changes produced while holding the store lock.
#[derive(Debug, Default)]
pub struct Outbox {
    records: Vec<Record>,
    deletes: Vec<(&'static str, String)>,
    activities: Vec<Activity>,
}

impl Outbox {
    /// Queues an entity for persistence.
    pub fn save(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Queues an entity deletion.
    pub fn delete(&mut self, kind: &'static str, id: String) {
        self.deletes.push((kind, id));
    }

    /// Queues an activity for the live feed.
    pub fn publish(&mut self, activity: Activity) {
        self.activities.push(activity);
    }

    /// Whether any queued change alters event or registration counts.
    fn touches_catalogue(&self) -> bool {
        self.records
            .iter()
            .any(|r| matches!(r, Record::Event(_) | Record::Registration(_)))
            || self.deletes.iter().any(|(kind, _)| *kind == "event")
    }
}

/// One page of results.
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Matching items across all pages.
    pub total: usize,
    /// Offset of the first item.
    pub offset: usize,
    /// Requested page size.
    pub limit: usize,
    /// More items follow this page.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Cuts a page out of an already filtered and sorted list.
    #[must_use]
    pub fn slice(all: Vec<T>, offset: usize, limit: usize) -> Self {
        let total = all.len();
        let items: Vec<T> = all.into_iter().skip(offset).take(limit).collect();
        let has_more = offset.saturating_add(items.len()) < total;
        Self {
            items,
            total,
            offset,
            limit,
            has_more,
        }
    }
}
