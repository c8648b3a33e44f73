//! Check-in service: badge scanning and door statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::{Outbox, ServiceContext};
use crate::auth::AuthUser;
use crate::domain::scan::DEFAULT_SCAN_LOCATION;
use crate::domain::{
    Activity, BadgeCode, BadgeSigner, BadgeType, EventId, EventStatus, RegistrationStatus,
    ScanId, ScanRecord, ScanType, StoreState, Ticket, TicketId, TicketType, UserId,
};
use crate::error::ApiError;
use crate::persistence::Record;

/// Default number of scans returned by the recent-scan listing.
pub const DEFAULT_RECENT_SCANS: usize = 50;

/// Body of `POST /checkin/scan`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Decoded QR text or a typed ticket number.
    pub code: String,
    /// Direction (default `CHECKIN`).
    pub scan_type: Option<ScanType>,
    /// Door or desk name (default `main_entrance`).
    pub scan_location: Option<String>,
    /// Event the scanner is operating for.
    pub event_id: Option<EventId>,
    /// Scanner session.
    pub session_id: Option<String>,
    /// Free-form note.
    pub notes: Option<String>,
}

/// Who was scanned.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendeeSummary {
    /// Ticket holder.
    pub user_id: UserId,
    /// Holder name.
    pub name: String,
    /// Holder email.
    pub email: String,
    /// Ticket category.
    pub ticket_type: TicketType,
    /// Badge category.
    pub badge_type: BadgeType,
    /// Printed ticket number.
    pub ticket_number: String,
    /// Special requests from the registration.
    pub special_requests: Option<String>,
}

/// Result of an accepted scan.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanResult {
    /// Attendee.
    pub attendee: AttendeeSummary,
    /// Event identifier.
    pub event_id: EventId,
    /// Event title.
    pub event_title: String,
    /// Recorded scan.
    pub scan: ScanRecord,
    /// Ticket after the scan.
    pub ticket: Ticket,
    /// `true` on the ticket's first check-in.
    pub first_checkin: bool,
}

/// A scan joined with its attendee.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanEntry {
    /// Scan.
    pub scan: ScanRecord,
    /// Ticket number.
    pub ticket_number: String,
    /// Holder name.
    pub attendee_name: String,
}

/// Recent scans for an event with aggregate counts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScanSummary {
    /// Event identifier.
    pub event_id: EventId,
    /// All scans for the event.
    pub total_scans: usize,
    /// Scans per direction.
    pub by_type: BTreeMap<String, usize>,
    /// Scans per location.
    pub by_location: BTreeMap<String, usize>,
    /// Most recent scans, newest first.
    pub recent: Vec<ScanEntry>,
}

/// One checked-in attendee.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckedInAttendee {
    /// Ticket identifier.
    pub ticket_id: TicketId,
    /// Ticket number.
    pub ticket_number: String,
    /// Holder name.
    pub name: String,
    /// Holder email.
    pub email: String,
    /// Badge category.
    pub badge_type: BadgeType,
    /// First check-in time.
    pub checkin_time: Option<chrono::DateTime<Utc>>,
    /// Accepted scans.
    pub scan_count: u32,
    /// Latest scan time.
    pub last_scan_at: Option<chrono::DateTime<Utc>>,
}

/// Query of the check-in listings.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckinQuery {
    /// Only check-ins on this UTC date.
    pub date: Option<NaiveDate>,
    /// Number of recent scans to return.
    pub limit: Option<usize>,
}

/// Door operations for organizers and admins.
#[derive(Debug, Clone)]
pub struct CheckinService {
    ctx: ServiceContext,
    signer: Arc<BadgeSigner>,
}

impl CheckinService {
    /// Creates a new `CheckinService`.
    #[must_use]
    pub fn new(ctx: ServiceContext, signer: Arc<BadgeSigner>) -> Self {
        Self { ctx, signer }
    }

    /// Validates a badge and records the scan.
    ///
    /// # Errors
    ///
    /// - [`ApiError::InvalidQrCode`] for unreadable or forged codes.
    /// - [`ApiError::TicketNotFound`] when no ticket matches.
    /// - [`ApiError::InvalidRequest`] when the ticket is for another event.
    /// - [`ApiError::CheckinRefused`] for unconfirmed registrations or
    ///   cancelled events.
    /// - [`ApiError::Conflict`] when the latest scan has the same direction.
    pub async fn scan(&self, staff: &AuthUser, request: ScanRequest) -> Result<ScanResult, ApiError> {
        staff.require_staff()?;
        let code = BadgeCode::parse(&request.code, &self.signer)?;
        let scan_type = request.scan_type.unwrap_or_default();
        let scan_location = request
            .scan_location
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_SCAN_LOCATION.to_string());

        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let result = {
            let ticket_id = resolve_ticket(&state, &code)?;
            let ticket = state
                .tickets
                .get(&ticket_id)
                .ok_or_else(|| ApiError::TicketNotFound(ticket_id.to_string()))?;

            if let Some(expected) = request.event_id
                && expected != ticket.event_id
            {
                return Err(ApiError::InvalidRequest(
                    "ticket is for a different event".to_string(),
                ));
            }
            let registration = state.registration(ticket.registration_id)?;
            if registration.status != RegistrationStatus::Confirmed {
                return Err(ApiError::CheckinRefused(format!(
                    "registration is {}",
                    registration.status
                )));
            }
            let event = state.event(ticket.event_id)?;
            if event.status == EventStatus::Cancelled {
                return Err(ApiError::CheckinRefused("event was cancelled".to_string()));
            }
            match state.last_scan(ticket_id).map(|s| s.scan_type) {
                Some(last) if last == scan_type => {
                    return Err(ApiError::Conflict(match scan_type {
                        ScanType::Checkin => "attendee is already checked in".to_string(),
                        ScanType::Checkout => "attendee is already checked out".to_string(),
                    }));
                }
                None if scan_type == ScanType::Checkout => {
                    return Err(ApiError::Conflict(
                        "attendee has not checked in yet".to_string(),
                    ));
                }
                _ => {}
            }

            let event_title = event.title.clone();
            let attendee = attendee_summary(
                &state,
                ticket,
                registration.ticket_type,
                registration.special_requests.clone(),
            );

            let now = Utc::now();
            let scan = ScanRecord {
                id: ScanId::new(),
                ticket_id,
                event_id: ticket.event_id,
                scan_type,
                scan_location,
                scanned_by: staff.id,
                session_id: request.session_id,
                notes: request.notes,
                scanned_at: now,
            };
            let ticket = state
                .tickets
                .get_mut(&ticket_id)
                .ok_or_else(|| ApiError::TicketNotFound(ticket_id.to_string()))?;
            let first_checkin = scan_type == ScanType::Checkin && !ticket.checked_in;
            if first_checkin {
                ticket.checked_in = true;
                ticket.checkin_time = Some(now);
            }
            ticket.scan_count = ticket.scan_count.saturating_add(1);
            ticket.last_scan_at = Some(now);
            let ticket = ticket.clone();
            state.scans.push(scan.clone());

            outbox.save(Record::Scan(scan.clone()));
            outbox.save(Record::Ticket(ticket.clone()));
            outbox.publish(Activity::BadgeScanned {
                event_id: ticket.event_id,
                ticket_id,
                scan_type,
                scan_location: scan.scan_location.clone(),
                scan_count: ticket.scan_count,
                timestamp: now,
            });
            tracing::info!(
                %ticket_id,
                event_id = %ticket.event_id,
                %scan_type,
                location = %scan.scan_location,
                scanned_by = %staff.id,
                "badge scanned"
            );
            ScanResult {
                attendee,
                event_id: ticket.event_id,
                event_title,
                scan,
                ticket,
                first_checkin,
            }
        };
        self.ctx.commit(state, outbox).await;
        Ok(result)
    }

    /// Recent scans for an event, newest first, with counts by direction
    /// and location.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] or [`ApiError::EventNotFound`].
    pub async fn recent_scans(
        &self,
        staff: &AuthUser,
        event_id: EventId,
        query: &CheckinQuery,
    ) -> Result<ScanSummary, ApiError> {
        staff.require_staff()?;
        let limit = query.limit.unwrap_or(DEFAULT_RECENT_SCANS).clamp(1, 500);
        let state = self.ctx.store.read().await;
        state.event(event_id)?;

        let mut by_type = BTreeMap::new();
        let mut by_location = BTreeMap::new();
        let mut total_scans = 0_usize;
        let for_event = state.scans.iter().filter(|s| {
            s.event_id == event_id
                && query
                    .date
                    .is_none_or(|d| s.scanned_at.date_naive() == d)
        });
        for scan in for_event.clone() {
            total_scans += 1;
            *by_type.entry(scan.scan_type.to_string()).or_insert(0_usize) += 1;
            *by_location
                .entry(scan.scan_location.clone())
                .or_insert(0_usize) += 1;
        }
        let recent = for_event
            .rev()
            .take(limit)
            .map(|scan| {
                let ticket = state.tickets.get(&scan.ticket_id);
                ScanEntry {
                    scan: scan.clone(),
                    ticket_number: ticket.map(|t| t.ticket_number.clone()).unwrap_or_default(),
                    attendee_name: ticket
                        .and_then(|t| state.users.get(&t.user_id))
                        .map(|u| u.full_name.clone())
                        .unwrap_or_default(),
                }
            })
            .collect();
        Ok(ScanSummary {
            event_id,
            total_scans,
            by_type,
            by_location,
            recent,
        })
    }

    /// Tickets checked in for an event, optionally only those whose first
    /// check-in fell on `query.date`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] or [`ApiError::EventNotFound`].
    pub async fn checked_in(
        &self,
        staff: &AuthUser,
        event_id: EventId,
        query: &CheckinQuery,
    ) -> Result<Vec<CheckedInAttendee>, ApiError> {
        staff.require_staff()?;
        let state = self.ctx.store.read().await;
        state.event(event_id)?;
        let mut attendees: Vec<CheckedInAttendee> = state
            .tickets
            .values()
            .filter(|t| t.event_id == event_id && t.checked_in)
            .filter(|t| {
                query.date.is_none_or(|d| {
                    t.checkin_time.is_some_and(|at| at.date_naive() == d)
                })
            })
            .map(|t| {
                let user = state.users.get(&t.user_id);
                CheckedInAttendee {
                    ticket_id: t.id,
                    ticket_number: t.ticket_number.clone(),
                    name: user.map(|u| u.full_name.clone()).unwrap_or_default(),
                    email: user.map(|u| u.email.clone()).unwrap_or_default(),
                    badge_type: t.badge_type,
                    checkin_time: t.checkin_time,
                    scan_count: t.scan_count,
                    last_scan_at: t.last_scan_at,
                }
            })
            .collect();
        attendees.sort_by(|a, b| a.checkin_time.cmp(&b.checkin_time));
        Ok(attendees)
    }
}

fn resolve_ticket(state: &StoreState, code: &BadgeCode) -> Result<TicketId, ApiError> {
    match code {
        BadgeCode::Qr(payload) => {
            let ticket = state
                .tickets
                .get(&payload.badge_id)
                .ok_or_else(|| ApiError::TicketNotFound(payload.badge_id.to_string()))?;
            if ticket.registration_id != payload.registration_id
                || ticket.user_id != payload.user_id
                || ticket.event_id != payload.event_id
            {
                return Err(ApiError::InvalidQrCode(
                    "payload does not match the issued ticket".to_string(),
                ));
            }
            Ok(ticket.id)
        }
        BadgeCode::TicketNumber(number) => state
            .ticket_id_by_number(number)
            .ok_or_else(|| ApiError::TicketNotFound(number.clone())),
    }
}

fn attendee_summary(
    state: &StoreState,
    ticket: &Ticket,
    ticket_type: TicketType,
    special_requests: Option<String>,
) -> AttendeeSummary {
    let user = state.users.get(&ticket.user_id);
    AttendeeSummary {
        user_id: ticket.user_id,
        name: user.map(|u| u.full_name.clone()).unwrap_or_default(),
        email: user.map(|u| u.email.clone()).unwrap_or_default(),
        ticket_type,
        badge_type: ticket.badge_type,
        ticket_number: ticket.ticket_number.clone(),
        special_requests,
    }
}
