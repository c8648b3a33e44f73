//! Registration service: signup, cancellation, tickets and the admin
//! registration dashboard.
//!
//! The status helpers [`confirm_registration`] and [`close_registration`]
//! are shared with the payment service so that a webhook, a bank-transfer
//! verification and an admin override all drive the same state machine.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::account_service::sync_user;
use super::{Outbox, Page, ServiceContext};
use crate::auth::AuthUser;
use crate::domain::payment::{generate_reference, ticket_number_for};
use crate::domain::{
    Activity, BadgeSigner, EventId, EventStatus, Payment, PaymentMethod, PaymentStatus,
    Registration, RegistrationId, RegistrationStatus, StoreState, Ticket, TicketType,
};
use crate::error::ApiError;
use crate::persistence::Record;

/// Owners may not cancel within this many hours of the event start.
pub const OWNER_CANCEL_CUTOFF_HOURS: i64 = 24;

/// Body of `POST /registrations`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRegistration {
    /// Event to register for.
    pub event_id: EventId,
    /// Ticket category.
    #[serde(default = "default_ticket_type")]
    pub ticket_type: TicketType,
    /// Dietary, accessibility or other requests.
    pub special_requests: Option<String>,
}

const fn default_ticket_type() -> TicketType {
    TicketType::Regular
}

/// Result of a new registration.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationReceipt {
    /// Stored registration.
    pub registration: Registration,
    /// Payment created alongside.
    pub payment: Payment,
    /// Ticket, already issued for free events.
    pub ticket: Option<Ticket>,
    /// `true` when the payer still has to pay.
    pub requires_payment: bool,
}

/// A registration together with its event, payment and ticket.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationDetail {
    /// Registration.
    pub registration: Registration,
    /// Event title.
    pub event_title: String,
    /// Event start.
    pub event_start: DateTime<Utc>,
    /// Event venue.
    pub event_venue: String,
    /// Attached payment.
    pub payment: Option<Payment>,
    /// Issued ticket.
    pub ticket: Option<Ticket>,
}

/// One row of the admin registration table and CSV export.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationRow {
    /// Registration.
    pub registration: Registration,
    /// Registrant name.
    pub user_name: String,
    /// Registrant email.
    pub user_email: String,
    /// Event title.
    pub event_title: String,
    /// Amount owed or paid.
    pub amount: Option<Decimal>,
    /// Currency code.
    pub currency: Option<String>,
    /// Payment status.
    pub payment_status: Option<PaymentStatus>,
    /// Payment channel.
    pub payment_method: Option<PaymentMethod>,
    /// Ticket has been scanned in.
    pub checked_in: bool,
}

/// Filter of the admin registration table.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RegistrationFilter {
    /// Only this event.
    pub event_id: Option<EventId>,
    /// Only this status.
    pub status: Option<RegistrationStatus>,
    /// Case-insensitive substring of name, email or ticket number.
    pub search: Option<String>,
    /// Items to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size (1..=100, default 20).
    pub limit: Option<usize>,
}

/// Body of the admin status override.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusOverride {
    /// Target status.
    pub status: RegistrationStatus,
}

/// Confirms a `PENDING` registration inside an open write section.
///
/// Settles the attached payment, sets the ticket number and issues the
/// ticket. Nothing is written unless every step succeeds.
///
/// # Errors
///
/// Returns [`ApiError::InvalidTransition`] if the registration or payment
/// cannot move, or [`ApiError::Internal`] if the badge cannot be signed.
pub(crate) fn confirm_registration(
    state: &mut StoreState,
    id: RegistrationId,
    signer: &BadgeSigner,
    source: &'static str,
    gateway_response: Option<serde_json::Value>,
    outbox: &mut Outbox,
) -> Result<(Registration, Ticket), ApiError> {
    let mut registration = state.registration(id)?.clone();
    let from = registration.status;
    registration.transition(RegistrationStatus::Confirmed)?;

    let mut payment = state.payment_for_registration(id).cloned();
    if let Some(p) = payment.as_mut() {
        if p.status != PaymentStatus::Completed {
            p.transition(PaymentStatus::Completed)?;
        }
        if gateway_response.is_some() {
            p.gateway_response = gateway_response;
        }
    }

    let ticket_number = ticket_number_for(&registration.payment_reference);
    registration.ticket_number = Some(ticket_number.clone());
    let ticket = match state.ticket_for_registration(id) {
        Some(existing) => existing.clone(),
        None => Ticket::issue(
            signer,
            id,
            registration.user_id,
            registration.event_id,
            ticket_number,
            registration.ticket_type,
        )?,
    };

    let now = Utc::now();
    let event_id = registration.event_id;
    if let Some(p) = payment {
        outbox.save(Record::Payment(p.clone()));
        outbox.publish(Activity::PaymentUpdated {
            event_id,
            payment_id: p.id,
            reference: p.reference.clone(),
            status: p.status,
            timestamp: now,
        });
        state.payments.insert(p.id, p);
    }
    outbox.save(Record::Registration(registration.clone()));
    outbox.publish(Activity::RegistrationStatusChanged {
        event_id,
        registration_id: id,
        from,
        to: RegistrationStatus::Confirmed,
        source,
        timestamp: now,
    });
    if !state.tickets.contains_key(&ticket.id) {
        outbox.save(Record::Ticket(ticket.clone()));
        outbox.publish(Activity::TicketIssued {
            event_id,
            ticket_id: ticket.id,
            ticket_number: ticket.ticket_number.clone(),
            timestamp: now,
        });
        state.tickets.insert(ticket.id, ticket.clone());
    }
    state.registrations.insert(id, registration.clone());

    tracing::info!(
        registration_id = %id,
        %event_id,
        ticket_number = %ticket.ticket_number,
        source,
        "registration confirmed"
    );
    Ok((registration, ticket))
}

/// Moves a `PENDING` registration to `CANCELLED` or `PAYMENT_FAILED` and
/// closes its unsettled payment accordingly.
///
/// # Errors
///
/// Returns [`ApiError::InvalidTransition`] for an illegal move.
pub(crate) fn close_registration(
    state: &mut StoreState,
    id: RegistrationId,
    next: RegistrationStatus,
    source: &'static str,
    gateway_response: Option<serde_json::Value>,
    outbox: &mut Outbox,
) -> Result<Registration, ApiError> {
    let payment_next = match next {
        RegistrationStatus::Cancelled => PaymentStatus::Cancelled,
        RegistrationStatus::PaymentFailed => PaymentStatus::Failed,
        RegistrationStatus::Pending | RegistrationStatus::Confirmed => {
            return Err(ApiError::Internal(format!(
                "{next} is not a closing status"
            )));
        }
    };
    let mut registration = state.registration(id)?.clone();
    let from = registration.status;
    registration.transition(next)?;

    let mut payment = state
        .payment_for_registration(id)
        .filter(|p| !p.status.is_terminal())
        .cloned();
    if let Some(p) = payment.as_mut() {
        p.transition(payment_next)?;
        if gateway_response.is_some() {
            p.gateway_response = gateway_response;
        }
    }

    let now = Utc::now();
    let event_id = registration.event_id;
    if let Some(p) = payment {
        outbox.save(Record::Payment(p.clone()));
        outbox.publish(Activity::PaymentUpdated {
            event_id,
            payment_id: p.id,
            reference: p.reference.clone(),
            status: p.status,
            timestamp: now,
        });
        state.payments.insert(p.id, p);
    }
    outbox.save(Record::Registration(registration.clone()));
    outbox.publish(Activity::RegistrationStatusChanged {
        event_id,
        registration_id: id,
        from,
        to: next,
        source,
        timestamp: now,
    });
    state.registrations.insert(id, registration.clone());

    tracing::info!(registration_id = %id, %event_id, to = %next, source, "registration closed");
    Ok(registration)
}

/// Registration and ticketing operations.
#[derive(Debug, Clone)]
pub struct RegistrationService {
    ctx: ServiceContext,
    signer: Arc<BadgeSigner>,
    currency: String,
    reference_prefix: String,
}

impl RegistrationService {
    /// Creates a new `RegistrationService`.
    #[must_use]
    pub fn new(
        ctx: ServiceContext,
        signer: Arc<BadgeSigner>,
        currency: String,
        reference_prefix: String,
    ) -> Self {
        Self {
            ctx,
            signer,
            currency,
            reference_prefix,
        }
    }

    /// Registers the caller for an event.
    ///
    /// Free events are confirmed immediately with a `FREE` payment and a
    /// ticket; paid events start `PENDING` with a `PENDING` card payment.
    ///
    /// # Errors
    ///
    /// - [`ApiError::EventNotFound`] for unknown, draft or private events
    ///   the caller cannot see.
    /// - [`ApiError::RegistrationClosed`] when the event is not published or
    ///   its registration window has passed.
    /// - [`ApiError::EventFull`] when capacity is reached.
    /// - [`ApiError::Conflict`] when the caller already holds an active
    ///   registration for the event.
    pub async fn create(
        &self,
        auth: &AuthUser,
        input: CreateRegistration,
    ) -> Result<RegistrationReceipt, ApiError> {
        let now = Utc::now();
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let receipt = {
            let event = state.event(input.event_id)?;
            if event.is_private && !auth.is_admin() {
                return Err(ApiError::EventNotFound(*input.event_id.as_uuid()));
            }
            if event.status != EventStatus::Published {
                return Err(ApiError::RegistrationClosed(format!(
                    "event is {}",
                    event.status
                )));
            }
            if !event.is_registration_open(now) {
                return Err(ApiError::RegistrationClosed(
                    "the registration window has passed".to_string(),
                ));
            }
            if state.active_registration_count(event.id) >= event.capacity {
                return Err(ApiError::EventFull(*event.id.as_uuid()));
            }
            if let Some(existing) = state.active_registration(auth.id, event.id) {
                return Err(ApiError::Conflict(format!(
                    "already registered for this event (registration {})",
                    existing.id
                )));
            }
            let amount = event.current_price(now);
            let event_id = event.id;

            sync_user(&mut state, auth, &mut outbox);

            let reference = generate_reference(&self.reference_prefix);
            let registration = Registration::new(
                auth.id,
                event_id,
                input.ticket_type,
                reference.clone(),
                input
                    .special_requests
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            );
            let registration_id = registration.id;
            let mut payment = Payment::new(
                registration_id,
                auth.id,
                amount,
                self.currency.clone(),
                reference,
            );
            if amount.is_zero() {
                payment.method = PaymentMethod::Free;
            }

            outbox.save(Record::Registration(registration.clone()));
            outbox.save(Record::Payment(payment.clone()));
            outbox.publish(Activity::RegistrationCreated {
                event_id,
                registration_id,
                user_id: auth.id,
                amount,
                timestamp: now,
            });
            state.registrations.insert(registration_id, registration.clone());
            state.payments.insert(payment.id, payment.clone());

            tracing::info!(
                %registration_id,
                %event_id,
                user_id = %auth.id,
                %amount,
                "registration created"
            );

            if amount.is_zero() {
                let (registration, ticket) = confirm_registration(
                    &mut state,
                    registration_id,
                    &self.signer,
                    "free",
                    None,
                    &mut outbox,
                )?;
                let payment = state
                    .payment_for_registration(registration_id)
                    .cloned()
                    .unwrap_or(payment);
                RegistrationReceipt {
                    registration,
                    payment,
                    ticket: Some(ticket),
                    requires_payment: false,
                }
            } else {
                RegistrationReceipt {
                    registration,
                    payment,
                    ticket: None,
                    requires_payment: true,
                }
            }
        };
        self.ctx.commit(state, outbox).await;
        Ok(receipt)
    }

    /// The caller's registrations, newest first.
    pub async fn list_mine(&self, auth: &AuthUser) -> Vec<RegistrationDetail> {
        let state = self.ctx.store.read().await;
        let mut mine: Vec<RegistrationDetail> = state
            .registrations
            .values()
            .filter(|r| r.user_id == auth.id)
            .filter_map(|r| detail(&state, r))
            .collect();
        mine.sort_by(|a, b| b.registration.created_at.cmp(&a.registration.created_at));
        mine
    }

    /// One registration, visible to its owner and to admins.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RegistrationNotFound`] or [`ApiError::Forbidden`].
    pub async fn get(
        &self,
        auth: &AuthUser,
        id: RegistrationId,
    ) -> Result<RegistrationDetail, ApiError> {
        let state = self.ctx.store.read().await;
        let registration = state.registration(id)?;
        ensure_owner_or_admin(auth, registration)?;
        detail(&state, registration).ok_or(ApiError::EventNotFound(*registration.event_id.as_uuid()))
    }

    /// Ticket of a confirmed registration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::TicketNotFound`] while the registration is not
    /// confirmed.
    pub async fn ticket(&self, auth: &AuthUser, id: RegistrationId) -> Result<Ticket, ApiError> {
        let state = self.ctx.store.read().await;
        let registration = state.registration(id)?;
        ensure_owner_or_admin(auth, registration)?;
        state
            .ticket_for_registration(id)
            .cloned()
            .ok_or_else(|| ApiError::TicketNotFound(format!("no ticket issued for {id}")))
    }

    /// Cancels a pending registration.
    ///
    /// Owners are refused within [`OWNER_CANCEL_CUTOFF_HOURS`] of the event
    /// start; admins may cancel any pending registration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`], [`ApiError::RegistrationClosed`]
    /// inside the cut-off window, or [`ApiError::InvalidTransition`] for a
    /// registration that is no longer pending.
    pub async fn cancel(
        &self,
        auth: &AuthUser,
        id: RegistrationId,
    ) -> Result<Registration, ApiError> {
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let registration = {
            let registration = state.registration(id)?;
            ensure_owner_or_admin(auth, registration)?;
            let source = if auth.is_admin() { "admin" } else { "owner" };
            if !auth.is_admin() {
                let start = state.event(registration.event_id)?.start_date;
                if start - Utc::now() < Duration::hours(OWNER_CANCEL_CUTOFF_HOURS) {
                    return Err(ApiError::RegistrationClosed(format!(
                        "registrations cannot be cancelled less than {OWNER_CANCEL_CUTOFF_HOURS} hours before the event"
                    )));
                }
            }
            close_registration(
                &mut state,
                id,
                RegistrationStatus::Cancelled,
                source,
                None,
                &mut outbox,
            )?
        };
        self.ctx.commit(state, outbox).await;
        Ok(registration)
    }

    /// Filtered, paginated registration table for admins.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins.
    pub async fn admin_list(
        &self,
        admin: &AuthUser,
        filter: &RegistrationFilter,
    ) -> Result<Page<RegistrationRow>, ApiError> {
        admin.require_admin()?;
        let limit = filter
            .limit
            .unwrap_or(super::event_service::DEFAULT_LIMIT)
            .clamp(1, super::event_service::MAX_LIMIT);
        let state = self.ctx.store.read().await;
        Ok(Page::slice(filtered_rows(&state, filter), filter.offset, limit))
    }

    /// Admin status override through the registration state machine.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins and
    /// [`ApiError::InvalidTransition`] for illegal moves.
    pub async fn admin_set_status(
        &self,
        admin: &AuthUser,
        id: RegistrationId,
        next: RegistrationStatus,
    ) -> Result<Registration, ApiError> {
        admin.require_admin()?;
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let registration = {
            match next {
                RegistrationStatus::Confirmed => {
                    confirm_registration(&mut state, id, &self.signer, "admin", None, &mut outbox)?.0
                }
                RegistrationStatus::Cancelled | RegistrationStatus::PaymentFailed => {
                    close_registration(&mut state, id, next, "admin", None, &mut outbox)?
                }
                RegistrationStatus::Pending => {
                    let current = state.registration(id)?;
                    return Err(ApiError::InvalidTransition {
                        entity: "registration",
                        from: current.status.to_string(),
                        to: next.to_string(),
                    });
                }
            }
        };
        self.ctx.commit(state, outbox).await;
        Ok(registration)
    }

    /// CSV export of every registration matching `filter`, ignoring
    /// pagination.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins.
    pub async fn export_csv(
        &self,
        admin: &AuthUser,
        filter: &RegistrationFilter,
    ) -> Result<String, ApiError> {
        admin.require_admin()?;
        let rows = {
            let state = self.ctx.store.read().await;
            filtered_rows(&state, filter)
        };
        tracing::info!(rows = rows.len(), "registrations exported");
        Ok(render_csv(&rows))
    }
}

fn ensure_owner_or_admin(auth: &AuthUser, registration: &Registration) -> Result<(), ApiError> {
    if registration.user_id == auth.id || auth.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "registration belongs to another user".to_string(),
        ))
    }
}

fn detail(state: &StoreState, registration: &Registration) -> Option<RegistrationDetail> {
    let event = state.events.get(&registration.event_id)?;
    Some(RegistrationDetail {
        registration: registration.clone(),
        event_title: event.title.clone(),
        event_start: event.start_date,
        event_venue: event.venue.clone(),
        payment: state.payment_for_registration(registration.id).cloned(),
        ticket: state.ticket_for_registration(registration.id).cloned(),
    })
}

fn filtered_rows(state: &StoreState, filter: &RegistrationFilter) -> Vec<RegistrationRow> {
    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let mut rows: Vec<RegistrationRow> = state
        .registrations
        .values()
        .filter(|r| filter.event_id.is_none_or(|id| r.event_id == id))
        .filter(|r| filter.status.is_none_or(|s| r.status == s))
        .map(|r| {
            let user = state.users.get(&r.user_id);
            let payment = state.payment_for_registration(r.id);
            RegistrationRow {
                registration: r.clone(),
                user_name: user.map(|u| u.full_name.clone()).unwrap_or_default(),
                user_email: user.map(|u| u.email.clone()).unwrap_or_default(),
                event_title: state
                    .events
                    .get(&r.event_id)
                    .map(|e| e.title.clone())
                    .unwrap_or_default(),
                amount: payment.map(|p| p.amount),
                currency: payment.map(|p| p.currency.clone()),
                payment_status: payment.map(|p| p.status),
                payment_method: payment.map(|p| p.method),
                checked_in: state
                    .ticket_for_registration(r.id)
                    .is_some_and(|t| t.checked_in),
            }
        })
        .filter(|row| {
            needle.as_deref().is_none_or(|n| {
                row.user_name.to_lowercase().contains(n)
                    || row.user_email.to_lowercase().contains(n)
                    || row
                        .registration
                        .ticket_number
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(n))
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.registration
            .created_at
            .cmp(&a.registration.created_at)
            .then_with(|| a.registration.id.cmp(&b.registration.id))
    });
    rows
}

const CSV_HEADER: &str = "registration_id,ticket_number,name,email,event,ticket_type,status,amount,currency,payment_status,payment_method,checked_in,registered_at";

/// Renders rows as RFC 4180 CSV with a header line.
#[must_use]
pub fn render_csv(rows: &[RegistrationRow]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + rows.len() * 160);
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");
    for row in rows {
        let r = &row.registration;
        let fields = [
            r.id.to_string(),
            r.ticket_number.clone().unwrap_or_default(),
            row.user_name.clone(),
            row.user_email.clone(),
            row.event_title.clone(),
            r.ticket_type.to_string(),
            r.status.to_string(),
            row.amount.map(|a| a.to_string()).unwrap_or_default(),
            row.currency.clone().unwrap_or_default(),
            row.payment_status.map(|s| s.to_string()).unwrap_or_default(),
            row.payment_method.map(|m| m.to_string()).unwrap_or_default(),
            row.checked_in.to_string(),
            r.created_at.to_rfc3339(),
        ];
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            push_csv_field(&mut out, field);
        }
        out.push_str("\r\n");
    }
    out
}

fn push_csv_field(out: &mut String, field: &str) {
    // Leading formula characters are neutralised for spreadsheet safety.
    let guarded = matches!(field.chars().next(), Some('=' | '+' | '-' | '@'))
        && field.parse::<Decimal>().is_err();
    if guarded || field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        if guarded {
            out.push('\'');
        }
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}
