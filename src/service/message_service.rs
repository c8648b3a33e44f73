//! Message service: contact form, member inbox and admin messaging.

use chrono::Utc;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use super::{Outbox, Page, ServiceContext};
use crate::auth::AuthUser;
use crate::domain::{Message, MessageId, MessageKind, MessageStatus, UserId};
use crate::error::ApiError;
use crate::persistence::Record;

/// Longest accepted subject line.
pub const MAX_SUBJECT_LEN: usize = 200;
/// Longest accepted body.
pub const MAX_BODY_LEN: usize = 5_000;

/// Body of `POST /contact`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ContactRequest {
    /// Sender name.
    pub name: String,
    /// Reply-to address.
    pub email: String,
    /// Subject line.
    pub subject: String,
    /// Message text.
    pub body: String,
}

/// Body of `POST /admin/messages`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OutgoingMessage {
    /// Recipient; omit for an announcement to every member.
    pub recipient_id: Option<UserId>,
    /// Subject line.
    pub subject: String,
    /// Message text.
    pub body: String,
}

/// Body of the admin status change.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MessageStatusUpdate {
    /// New status.
    pub status: MessageStatus,
}

/// Filter of the admin message table.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MessageFilter {
    /// Only this kind.
    pub kind: Option<MessageKind>,
    /// Only this status.
    pub status: Option<MessageStatus>,
    /// Case-insensitive substring of sender, email or subject.
    pub search: Option<String>,
    /// Items to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size (1..=100, default 20).
    pub limit: Option<usize>,
}

fn validate_text(subject: &str, body: &str) -> Result<(), ApiError> {
    if subject.trim().is_empty() || body.trim().is_empty() {
        return Err(ApiError::InvalidRequest(
            "subject and body are required".to_string(),
        ));
    }
    if subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(ApiError::InvalidRequest(format!(
            "subject must be at most {MAX_SUBJECT_LEN} characters"
        )));
    }
    if body.chars().count() > MAX_BODY_LEN {
        return Err(ApiError::InvalidRequest(format!(
            "body must be at most {MAX_BODY_LEN} characters"
        )));
    }
    Ok(())
}

fn looks_like_email(email: &str) -> bool {
    email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

/// Messaging operations.
#[derive(Debug, Clone)]
pub struct MessageService {
    ctx: ServiceContext,
}

impl MessageService {
    /// Creates a new `MessageService`.
    #[must_use]
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Stores a contact-form message for the admin inbox. Anonymous senders
    /// are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for missing fields or an invalid
    /// email address.
    pub async fn contact(
        &self,
        sender: Option<&AuthUser>,
        input: ContactRequest,
    ) -> Result<Message, ApiError> {
        validate_text(&input.subject, &input.body)?;
        let email = input.email.trim().to_string();
        if input.name.trim().is_empty() || !looks_like_email(&email) {
            return Err(ApiError::InvalidRequest(
                "a name and a valid email are required".to_string(),
            ));
        }
        let now = Utc::now();
        let message = Message {
            id: MessageId::new(),
            kind: MessageKind::Contact,
            sender_id: sender.map(|s| s.id),
            sender_name: input.name.trim().to_string(),
            sender_email: email,
            recipient_id: None,
            subject: input.subject.trim().to_string(),
            body: input.body.trim().to_string(),
            status: MessageStatus::Unread,
            created_at: now,
            updated_at: now,
        };
        self.insert(message).await
    }

    /// Sends an announcement (no recipient) or a direct message.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins and
    /// [`ApiError::InvalidRequest`] for an unknown recipient or empty text.
    pub async fn admin_send(
        &self,
        admin: &AuthUser,
        input: OutgoingMessage,
    ) -> Result<Message, ApiError> {
        admin.require_admin()?;
        validate_text(&input.subject, &input.body)?;
        if let Some(recipient) = input.recipient_id
            && !self.ctx.store.read().await.users.contains_key(&recipient)
        {
            return Err(ApiError::InvalidRequest(format!(
                "unknown recipient {recipient}"
            )));
        }
        let now = Utc::now();
        let message = Message {
            id: MessageId::new(),
            kind: if input.recipient_id.is_some() {
                MessageKind::Direct
            } else {
                MessageKind::Announcement
            },
            sender_id: Some(admin.id),
            sender_name: admin.name.clone(),
            sender_email: admin.email.clone(),
            recipient_id: input.recipient_id,
            subject: input.subject.trim().to_string(),
            body: input.body.trim().to_string(),
            status: MessageStatus::Unread,
            created_at: now,
            updated_at: now,
        };
        self.insert(message).await
    }

    async fn insert(&self, message: Message) -> Result<Message, ApiError> {
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        {
            state.messages.insert(message.id, message.clone());
        }
        outbox.save(Record::Message(message.clone()));
        self.ctx.commit(state, outbox).await;
        tracing::info!(message_id = %message.id, kind = ?message.kind, "message stored");
        Ok(message)
    }

    /// Announcements, direct messages and the caller's own contact
    /// messages, newest first. Archived messages are left out.
    pub async fn inbox(&self, auth: &AuthUser) -> Vec<Message> {
        let state = self.ctx.store.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|m| m.is_visible_to(auth.id) && m.status != MessageStatus::Archived)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages
    }

    /// Marks a direct message addressed to the caller as read.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MessageNotFound`] for messages the caller cannot
    /// see and [`ApiError::Conflict`] for announcements, whose status is
    /// managed by admins.
    pub async fn mark_read(&self, auth: &AuthUser, id: MessageId) -> Result<Message, ApiError> {
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let message = {
            let message = state
                .messages
                .get_mut(&id)
                .filter(|m| m.is_visible_to(auth.id))
                .ok_or(ApiError::MessageNotFound(*id.as_uuid()))?;
            if message.kind != MessageKind::Direct {
                return Err(ApiError::Conflict(
                    "only direct messages can be marked as read".to_string(),
                ));
            }
            if message.status == MessageStatus::Unread {
                message.status = MessageStatus::Read;
                message.updated_at = Utc::now();
                outbox.save(Record::Message(message.clone()));
            }
            message.clone()
        };
        self.ctx.commit(state, outbox).await;
        Ok(message)
    }

    /// Filtered, paginated message table for admins, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins.
    pub async fn admin_list(
        &self,
        admin: &AuthUser,
        filter: &MessageFilter,
    ) -> Result<Page<Message>, ApiError> {
        admin.require_admin()?;
        let needle = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let limit = filter
            .limit
            .unwrap_or(super::event_service::DEFAULT_LIMIT)
            .clamp(1, super::event_service::MAX_LIMIT);
        let state = self.ctx.store.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|m| filter.kind.is_none_or(|k| m.kind == k))
            .filter(|m| filter.status.is_none_or(|s| m.status == s))
            .filter(|m| {
                needle.as_deref().is_none_or(|n| {
                    m.sender_name.to_lowercase().contains(n)
                        || m.sender_email.to_lowercase().contains(n)
                        || m.subject.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(Page::slice(messages, filter.offset, limit))
    }

    /// Sets the status of any message.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] or [`ApiError::MessageNotFound`].
    pub async fn admin_set_status(
        &self,
        admin: &AuthUser,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<Message, ApiError> {
        admin.require_admin()?;
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let message = {
            let message = state
                .messages
                .get_mut(&id)
                .ok_or(ApiError::MessageNotFound(*id.as_uuid()))?;
            message.status = status;
            message.updated_at = Utc::now();
            outbox.save(Record::Message(message.clone()));
            message.clone()
        };
        self.ctx.commit(state, outbox).await;
        Ok(message)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::service::account_service::AccountService;
    use crate::service::test_support::{context, user};

    fn contact() -> ContactRequest {
        ContactRequest {
            name: "Visitor".to_string(),
            email: "visitor@example.org".to_string(),
            subject: "Reunion".to_string(),
            body: "When is the next reunion?".to_string(),
        }
    }

    #[tokio::test]
    async fn contact_requires_valid_email() {
        let svc = MessageService::new(context());
        let mut bad = contact();
        bad.email = "nobody".to_string();
        assert!(matches!(
            svc.contact(None, bad).await,
            Err(ApiError::InvalidRequest(_))
        ));
        let Ok(message) = svc.contact(None, contact()).await else {
            panic!("contact failed");
        };
        assert_eq!(message.kind, MessageKind::Contact);
        assert!(message.sender_id.is_none());
    }

    #[tokio::test]
    async fn direct_message_reaches_only_its_recipient() {
        let ctx = context();
        let svc = MessageService::new(ctx.clone());
        let admin = user(Role::Admin);
        let member = user(Role::Member);
        let bystander = user(Role::Member);
        AccountService::new(ctx).sync(&member).await;

        let Ok(direct) = svc
            .admin_send(
                &admin,
                OutgoingMessage {
                    recipient_id: Some(member.id),
                    subject: "Your badge".to_string(),
                    body: "Bring ID".to_string(),
                },
            )
            .await
        else {
            panic!("send failed");
        };
        assert_eq!(direct.kind, MessageKind::Direct);
        assert_eq!(svc.inbox(&member).await.len(), 1);
        assert!(svc.inbox(&bystander).await.is_empty());
        assert!(matches!(
            svc.mark_read(&bystander, direct.id).await,
            Err(ApiError::MessageNotFound(_))
        ));
        let Ok(read) = svc.mark_read(&member, direct.id).await else {
            panic!("mark read failed");
        };
        assert_eq!(read.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn unknown_recipient_is_rejected() {
        let svc = MessageService::new(context());
        let result = svc
            .admin_send(
                &user(Role::Admin),
                OutgoingMessage {
                    recipient_id: Some(UserId::new()),
                    subject: "Hi".to_string(),
                    body: "There".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn admin_filters_by_status() {
        let svc = MessageService::new(context());
        let admin = user(Role::Admin);
        let Ok(first) = svc.contact(None, contact()).await else {
            panic!("contact failed");
        };
        assert!(svc.contact(None, contact()).await.is_ok());
        assert!(
            svc.admin_set_status(&admin, first.id, MessageStatus::Archived)
                .await
                .is_ok()
        );
        let filter = MessageFilter {
            status: Some(MessageStatus::Unread),
            ..MessageFilter::default()
        };
        let Ok(page) = svc.admin_list(&admin, &filter).await else {
            panic!("list failed");
        };
        assert_eq!(page.total, 1);
        assert!(matches!(
            svc.admin_list(&user(Role::Member), &filter).await,
            Err(ApiError::Forbidden(_))
        ));
    }
}
