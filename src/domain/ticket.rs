//! Tickets (badges) and their signed QR payload.
//!
//! A ticket is issued exactly once, when its registration becomes
//! `CONFIRMED`. The QR code printed on the badge is a small JSON document
//! whose `checksum` is a truncated HMAC-SHA256 over the identifying fields,
//! so a scanner can reject forged or edited payloads without a lookup.

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;

use super::{EventId, RegistrationId, TicketId, TicketType, UserId};
use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Hex characters kept from the HMAC output.
pub const CHECKSUM_LEN: usize = 16;

/// Badge category printed on the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeType {
    /// Regular attendee.
    Attendee,
    /// VIP guest.
    Vip,
    /// Student attendee.
    Student,
}

impl From<TicketType> for BadgeType {
    fn from(ticket_type: TicketType) -> Self {
        match ticket_type {
            TicketType::Regular => Self::Attendee,
            TicketType::Vip => Self::Vip,
            TicketType::Student => Self::Student,
        }
    }
}

/// The badge presented at check-in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    /// Ticket identifier (the badge id inside the QR payload).
    pub id: TicketId,
    /// Confirmed registration this ticket was issued for.
    pub registration_id: RegistrationId,
    /// Holder.
    pub user_id: UserId,
    /// Event admitted to.
    pub event_id: EventId,
    /// Human-readable number, accepted by manual entry.
    pub ticket_number: String,
    /// Badge category.
    pub badge_type: BadgeType,
    /// Serialized [`QrPayload`] to render as a QR code.
    pub qr_code: String,
    /// Holder has checked in at least once.
    pub checked_in: bool,
    /// First check-in time.
    pub checkin_time: Option<DateTime<Utc>>,
    /// Number of accepted scans.
    pub scan_count: u32,
    /// Time of the latest accepted scan.
    pub last_scan_at: Option<DateTime<Utc>>,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
}

impl Ticket {
    /// Issues a ticket and signs its QR payload.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if the payload cannot be signed or
    /// serialized.
    pub fn issue(
        signer: &BadgeSigner,
        registration_id: RegistrationId,
        user_id: UserId,
        event_id: EventId,
        ticket_number: String,
        ticket_type: TicketType,
    ) -> Result<Self, ApiError> {
        let id = TicketId::new();
        let issued_at = Utc::now();
        let payload = signer.sign(QrPayload {
            user_id,
            event_id,
            registration_id,
            badge_id: id,
            issued_at,
            checksum: String::new(),
        })?;
        let qr_code =
            serde_json::to_string(&payload).map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(Self {
            id,
            registration_id,
            user_id,
            event_id,
            ticket_number,
            badge_type: ticket_type.into(),
            qr_code,
            checked_in: false,
            checkin_time: None,
            scan_count: 0,
            last_scan_at: None,
            issued_at,
        })
    }
}

/// JSON document encoded in the badge QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QrPayload {
    /// Ticket holder.
    pub user_id: UserId,
    /// Event admitted to.
    pub event_id: EventId,
    /// Source registration.
    pub registration_id: RegistrationId,
    /// Ticket id.
    pub badge_id: TicketId,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Truncated hex HMAC over the fields above.
    pub checksum: String,
}

impl QrPayload {
    fn signing_input(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.registration_id,
            self.user_id,
            self.event_id,
            self.badge_id,
            self.issued_at.timestamp()
        )
    }
}

/// Signs and verifies QR payloads with a shared secret.
#[derive(Clone)]
pub struct BadgeSigner {
    key: Vec<u8>,
}

impl fmt::Debug for BadgeSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BadgeSigner").field("key", &"[redacted]").finish()
    }
}

impl BadgeSigner {
    /// Creates a signer from a secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self, payload: &QrPayload) -> Result<HmacSha256, ApiError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).map_err(|e| ApiError::Internal(e.to_string()))?;
        mac.update(payload.signing_input().as_bytes());
        Ok(mac)
    }

    /// Fills in the checksum of `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if the MAC cannot be keyed.
    pub fn sign(&self, mut payload: QrPayload) -> Result<QrPayload, ApiError> {
        let digest = hex::encode(self.mac(&payload)?.finalize().into_bytes());
        payload.checksum = digest.chars().take(CHECKSUM_LEN).collect();
        Ok(payload)
    }

    /// Checks the checksum of `payload` in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidQrCode`] when the checksum is malformed or
    /// does not match.
    pub fn verify(&self, payload: &QrPayload) -> Result<(), ApiError> {
        if payload.checksum.len() != CHECKSUM_LEN {
            return Err(ApiError::InvalidQrCode("checksum has wrong length".to_string()));
        }
        let tag = hex::decode(&payload.checksum)
            .map_err(|_| ApiError::InvalidQrCode("checksum is not hex".to_string()))?;
        self.mac(payload)?
            .verify_truncated_left(&tag)
            .map_err(|_| ApiError::InvalidQrCode("checksum mismatch".to_string()))
    }
}

/// What a scanner sent: a verified QR payload or a typed ticket number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeCode {
    /// Signed JSON payload read from the QR code.
    Qr(QrPayload),
    /// Ticket number entered by hand.
    TicketNumber(String),
}

impl BadgeCode {
    /// Parses and authenticates raw scanner input.
    ///
    /// Input starting with `{` must be a QR payload with a valid checksum;
    /// anything else is treated as a ticket number.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidQrCode`] for empty input, malformed JSON or
    /// a bad checksum.
    pub fn parse(raw: &str, signer: &BadgeSigner) -> Result<Self, ApiError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ApiError::InvalidQrCode("empty code".to_string()));
        }
        if raw.starts_with('{') {
            let payload: QrPayload = serde_json::from_str(raw)
                .map_err(|e| ApiError::InvalidQrCode(format!("malformed payload: {e}")))?;
            signer.verify(&payload)?;
            return Ok(Self::Qr(payload));
        }
        Ok(Self::TicketNumber(raw.to_string()))
    }
}
