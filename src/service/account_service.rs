//! Account service: keeps the user table in sync with token claims.

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use super::{Outbox, ServiceContext};
use crate::auth::AuthUser;
use crate::domain::{AlumniProfile, MessageKind, MessageStatus, Registration, StoreState, User};
use crate::persistence::Record;

/// The caller's own account overview.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountOverview {
    /// Stored user.
    pub user: User,
    /// Directory profile, if created.
    pub profile: Option<AlumniProfile>,
    /// All registrations, newest first.
    pub registrations: Vec<Registration>,
    /// Unread direct messages addressed to the caller.
    pub unread_messages: usize,
}

/// Upserts the user described by `auth` inside an open write section.
///
/// Nothing is queued when the stored user already matches the claims.
pub(crate) fn sync_user(state: &mut StoreState, auth: &AuthUser, outbox: &mut Outbox) -> User {
    let name = if auth.name.trim().is_empty() {
        auth.email.clone()
    } else {
        auth.name.clone()
    };
    match state.users.get_mut(&auth.id) {
        Some(user) => {
            if user.email != auth.email || user.full_name != name || user.role != auth.role {
                user.email.clone_from(&auth.email);
                user.full_name = name;
                user.role = auth.role;
                user.updated_at = Utc::now();
                outbox.save(Record::User(user.clone()));
            }
            user.clone()
        }
        None => {
            let user = User::new(auth.id, auth.email.clone(), name, auth.role);
            state.users.insert(user.id, user.clone());
            outbox.save(Record::User(user.clone()));
            tracing::info!(user_id = %user.id, role = %user.role, "user registered");
            user
        }
    }
}

/// Account operations for the authenticated caller.
#[derive(Debug, Clone)]
pub struct AccountService {
    ctx: ServiceContext,
}

impl AccountService {
    /// Creates a new `AccountService`.
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Upserts the caller from their token claims.
    pub async fn sync(&self, auth: &AuthUser) -> User {
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let user = {
            sync_user(&mut state, auth, &mut outbox)
        };
        self.ctx.commit(state, outbox).await;
        user
    }

    /// Returns the caller's account overview, syncing the user first.
    pub async fn overview(&self, auth: &AuthUser) -> AccountOverview {
        let user = self.sync(auth).await;
        let state = self.ctx.store.read().await;
        let mut registrations: Vec<Registration> = state
            .registrations
            .values()
            .filter(|r| r.user_id == auth.id)
            .cloned()
            .collect();
        registrations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let unread_messages = state
            .messages
            .values()
            .filter(|m| {
                m.kind == MessageKind::Direct
                    && m.is_visible_to(auth.id)
                    && m.status == MessageStatus::Unread
            })
            .count();
        AccountOverview {
            user,
            profile: state.profiles.get(&auth.id).cloned(),
            registrations,
            unread_messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::service::test_support::{context, user};

    #[tokio::test]
    async fn sync_creates_then_updates() {
        let service = AccountService::new(context());
        let mut auth = user(Role::Member);
        let created = service.sync(&auth).await;
        assert_eq!(created.role, Role::Member);

        auth.role = Role::Organizer;
        let updated = service.sync(&auth).await;
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.role, Role::Organizer);
        assert_eq!(service.ctx.store.read().await.users.len(), 1);
    }

    #[tokio::test]
    async fn overview_of_new_user_is_empty() {
        let service = AccountService::new(context());
        let overview = service.overview(&user(Role::Member)).await;
        assert!(overview.profile.is_none());
        assert!(overview.registrations.is_empty());
        assert_eq!(overview.unread_messages, 0);
    }
}
