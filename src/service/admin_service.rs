//! Admin service: platform analytics, site configuration and the stored
//! activity log.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{Outbox, ServiceContext};
use crate::auth::AuthUser;
use crate::domain::{EventId, EventStatus, MessageKind, MessageStatus, PaymentStatus};
use crate::error::ApiError;
use crate::persistence::models::StoredActivity;
use crate::persistence::{PostgresPersistence, Record};

/// Largest site-config key accepted.
pub const MAX_CONFIG_KEY_LEN: usize = 64;
/// Default activity-log window.
pub const DEFAULT_ACTIVITY_WINDOW_HOURS: i64 = 24;

/// Platform-wide totals for the admin dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlatformAnalytics {
    /// Known users.
    pub users: usize,
    /// Events per status.
    pub events_by_status: BTreeMap<String, usize>,
    /// Registrations per status.
    pub registrations_by_status: BTreeMap<String, usize>,
    /// Payments per status.
    pub payments_by_status: BTreeMap<String, usize>,
    /// Sum of completed payments.
    pub revenue: Decimal,
    /// Bank transfers awaiting verification.
    pub pending_bank_transfers: usize,
    /// Issued tickets.
    pub tickets_issued: usize,
    /// Tickets checked in at least once.
    pub tickets_checked_in: usize,
    /// Recorded scans.
    pub total_scans: usize,
    /// Directory profiles.
    pub profiles: usize,
    /// Profiles listed publicly.
    pub public_profiles: usize,
    /// Unread contact-form messages.
    pub unread_contact_messages: usize,
    /// Published events that have not started.
    pub upcoming_events: usize,
    /// When the numbers were computed.
    pub generated_at: DateTime<Utc>,
}

/// Query of the stored activity log.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    /// Only activities after this time (default: the last 24 hours).
    pub since: Option<DateTime<Utc>>,
    /// Only activities of this event.
    pub event_id: Option<EventId>,
}

fn count_by<K: ToString>(keys: impl Iterator<Item = K>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0_usize) += 1;
    }
    counts
}

/// Admin-only operations that span every entity.
#[derive(Debug, Clone)]
pub struct AdminService {
    ctx: ServiceContext,
    db: Option<PostgresPersistence>,
}

impl AdminService {
    /// Creates a new `AdminService`. The activity log is empty when `db`
    /// is `None`.
    #[must_use]
    pub fn new(ctx: ServiceContext, db: Option<PostgresPersistence>) -> Self {
        Self { ctx, db }
    }

    /// Platform totals.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins.
    pub async fn analytics(&self, admin: &AuthUser) -> Result<PlatformAnalytics, ApiError> {
        admin.require_admin()?;
        let now = Utc::now();
        let state = self.ctx.store.read().await;
        Ok(PlatformAnalytics {
            users: state.users.len(),
            events_by_status: count_by(state.events.values().map(|e| e.status)),
            registrations_by_status: count_by(state.registrations.values().map(|r| r.status)),
            payments_by_status: count_by(state.payments.values().map(|p| p.status)),
            revenue: state
                .payments
                .values()
                .filter(|p| p.status == PaymentStatus::Completed)
                .map(|p| p.amount)
                .sum(),
            pending_bank_transfers: state
                .payments
                .values()
                .filter(|p| p.status == PaymentStatus::BankTransferPending)
                .count(),
            tickets_issued: state.tickets.len(),
            tickets_checked_in: state.tickets.values().filter(|t| t.checked_in).count(),
            total_scans: state.scans.len(),
            profiles: state.profiles.len(),
            public_profiles: state.profiles.values().filter(|p| p.is_public).count(),
            unread_contact_messages: state
                .messages
                .values()
                .filter(|m| m.kind == MessageKind::Contact && m.status == MessageStatus::Unread)
                .count(),
            upcoming_events: state
                .events
                .values()
                .filter(|e| e.status == EventStatus::Published && e.start_date > now)
                .count(),
            generated_at: now,
        })
    }

    /// Public site configuration.
    pub async fn site_config(&self) -> BTreeMap<String, serde_json::Value> {
        self.ctx.store.read().await.site_config.clone()
    }

    /// Sets the given keys; a `null` value removes its key. Other keys are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins and
    /// [`ApiError::InvalidRequest`] for empty or overlong keys.
    pub async fn update_site_config(
        &self,
        admin: &AuthUser,
        changes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<BTreeMap<String, serde_json::Value>, ApiError> {
        admin.require_admin()?;
        if let Some(bad) = changes
            .keys()
            .find(|k| k.trim().is_empty() || k.len() > MAX_CONFIG_KEY_LEN)
        {
            return Err(ApiError::InvalidRequest(format!(
                "invalid configuration key {bad:?}"
            )));
        }
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let config = {
            for (key, value) in changes {
                if value.is_null() {
                    state.site_config.remove(&key);
                } else {
                    state.site_config.insert(key, value);
                }
            }
            state.site_config.clone()
        };
        outbox.save(Record::SiteConfig(
            config.clone().into_iter().collect(),
        ));
        self.ctx.commit(state, outbox).await;
        tracing::info!(keys = config.len(), admin = %admin.id, "site configuration updated");
        Ok(config)
    }

    /// Stored activities, oldest first. Empty when persistence is off.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins and
    /// [`ApiError::PersistenceError`] when the query fails.
    pub async fn activity_log(
        &self,
        admin: &AuthUser,
        query: &ActivityQuery,
    ) -> Result<Vec<StoredActivity>, ApiError> {
        admin.require_admin()?;
        let Some(db) = &self.db else {
            return Ok(Vec::new());
        };
        let since = query
            .since
            .unwrap_or_else(|| Utc::now() - Duration::hours(DEFAULT_ACTIVITY_WINDOW_HOURS));
        db.load_activities_after(since, query.event_id.map(uuid::Uuid::from))
            .await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::domain::event::tests::sample_event;
    use crate::service::test_support::{context, user};

    #[tokio::test]
    async fn analytics_counts_by_status() {
        let svc = AdminService::new(context(), None);
        {
            let mut state = svc.ctx.store.write().await;
            let published = sample_event();
            let mut draft = sample_event();
            draft.status = EventStatus::Draft;
            state.events.insert(published.id, published);
            state.events.insert(draft.id, draft);
        }
        let Ok(stats) = svc.analytics(&user(Role::Admin)).await else {
            panic!("analytics failed");
        };
        assert_eq!(stats.events_by_status.get("PUBLISHED"), Some(&1));
        assert_eq!(stats.events_by_status.get("DRAFT"), Some(&1));
        assert_eq!(stats.upcoming_events, 1);
        assert!(matches!(
            svc.analytics(&user(Role::Organizer)).await,
            Err(ApiError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn site_config_merges_and_removes_keys() {
        let svc = AdminService::new(context(), None);
        let admin = user(Role::Admin);
        let mut first = serde_json::Map::new();
        first.insert("hero_title".to_string(), serde_json::json!("Welcome home"));
        first.insert("show_gallery".to_string(), serde_json::json!(true));
        assert!(svc.update_site_config(&admin, first).await.is_ok());

        let mut second = serde_json::Map::new();
        second.insert("show_gallery".to_string(), serde_json::Value::Null);
        let Ok(config) = svc.update_site_config(&admin, second).await else {
            panic!("update failed");
        };
        assert_eq!(config.len(), 1);
        assert_eq!(svc.site_config().await.get("hero_title"), Some(&serde_json::json!("Welcome home")));

        let mut bad = serde_json::Map::new();
        bad.insert(" ".to_string(), serde_json::json!(1));
        assert!(matches!(
            svc.update_site_config(&admin, bad).await,
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn activity_log_is_empty_without_database() {
        let svc = AdminService::new(context(), None);
        let Ok(rows) = svc
            .activity_log(&user(Role::Admin), &ActivityQuery::default())
            .await
        else {
            panic!("activity log failed");
        };
        assert!(rows.is_empty());
    }
}
