//! Payments attached one-to-one to registrations.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{PaymentId, RegistrationId, UserId};
use crate::error::ApiError;

/// How a payment is (or will be) settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Card payment through the hosted gateway checkout.
    Card,
    /// Manual bank transfer verified by an admin.
    BankTransfer,
    /// Zero-priced event; nothing to collect.
    Free,
}

impl PaymentMethod {
    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "CARD",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::Free => "FREE",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status.
///
/// `PENDING` may move to any other state; `BANK_TRANSFER_PENDING` awaits
/// admin verification and may only settle. The rest are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Created, nothing received yet.
    Pending,
    /// Payer reports a transfer; awaiting admin verification.
    BankTransferPending,
    /// Funds received.
    Completed,
    /// Declined or rejected.
    Failed,
    /// Registration was cancelled before payment.
    Cancelled,
}

impl PaymentStatus {
    /// Returns `true` when `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::BankTransferPending | Self::Completed | Self::Failed | Self::Cancelled
            ) | (
                Self::BankTransferPending,
                Self::Completed | Self::Failed | Self::Cancelled
            )
        )
    }

    /// Returns `true` for settled states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::BankTransferPending => "BANK_TRANSFER_PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the payer reports when announcing a bank transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BankTransferDetails {
    /// Name on the sending account.
    pub account_name: String,
    /// Sending bank.
    pub bank_name: Option<String>,
    /// Transfer reference or teller number.
    pub transfer_reference: Option<String>,
    /// Date the transfer was made.
    pub transfer_date: Option<DateTime<Utc>>,
}

/// Money owed for a registration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    /// Payment identifier.
    pub id: PaymentId,
    /// Owning registration.
    pub registration_id: RegistrationId,
    /// Payer.
    pub user_id: UserId,
    /// Amount in major currency units.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Unique reference, shared with the gateway.
    pub reference: String,
    /// Settlement channel.
    pub method: PaymentMethod,
    /// Current status.
    pub status: PaymentStatus,
    /// Hosted checkout URL returned by the gateway.
    pub authorization_url: Option<String>,
    /// Last gateway payload seen for this payment (webhook or verify).
    #[schema(value_type = Option<Object>)]
    pub gateway_response: Option<serde_json::Value>,
    /// Transfer details reported by the payer.
    pub bank_details: Option<BankTransferDetails>,
    /// Admin who verified a bank transfer.
    pub verified_by: Option<UserId>,
    /// Admin notes from bank-transfer verification.
    pub verification_notes: Option<String>,
    /// When the payment completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a `PENDING` card payment.
    #[must_use]
    pub fn new(
        registration_id: RegistrationId,
        user_id: UserId,
        amount: Decimal,
        currency: String,
        reference: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            registration_id,
            user_id,
            amount,
            currency,
            reference,
            method: PaymentMethod::Card,
            status: PaymentStatus::Pending,
            authorization_url: None,
            gateway_response: None,
            bank_details: None,
            verified_by: None,
            verification_notes: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves to `next` if the lifecycle allows it. Reaching `COMPLETED`
    /// stamps `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidTransition`] for illegal moves.
    pub fn transition(&mut self, next: PaymentStatus) -> Result<(), ApiError> {
        if !self.status.can_transition_to(next) {
            return Err(ApiError::InvalidTransition {
                entity: "payment",
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let now = Utc::now();
        if next == PaymentStatus::Completed {
            self.completed_at = Some(now);
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Builds a payment reference of the form `PREFIX-123456-AB12`.
///
/// The numeric part comes from the current millisecond clock, the suffix
/// from a fresh v4 UUID.
#[must_use]
pub fn generate_reference(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis().rem_euclid(1_000_000);
    let suffix: String = uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(4)
        .collect::<String>()
        .to_ascii_uppercase();
    format!("{prefix}-{millis:06}-{suffix}")
}

/// Derives the ticket number printed on the badge from a payment reference.
#[must_use]
pub fn ticket_number_for(reference: &str) -> String {
    format!("TKT-{reference}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Payment {
        Payment::new(
            RegistrationId::new(),
            UserId::new(),
            Decimal::from(15_000),
            "NGN".to_string(),
            generate_reference("ALU"),
        )
    }

    #[test]
    fn reference_has_expected_shape() {
        let reference = generate_reference("ALU");
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.first(), Some(&"ALU"));
        assert!(parts.get(1).is_some_and(|p| p.len() == 6 && p.chars().all(|c| c.is_ascii_digit())));
        assert!(parts.get(2).is_some_and(|p| p.len() == 4 && p.chars().all(|c| c.is_ascii_alphanumeric())));
    }

    #[test]
    fn references_are_distinct() {
        assert_ne!(generate_reference("ALU"), generate_reference("ALU"));
    }

    #[test]
    fn completion_stamps_completed_at() {
        let mut payment = pending();
        assert!(payment.transition(PaymentStatus::Completed).is_ok());
        assert!(payment.completed_at.is_some());
    }

    #[test]
    fn bank_transfer_pending_cannot_return_to_pending() {
        let mut payment = pending();
        assert!(payment.transition(PaymentStatus::BankTransferPending).is_ok());
        assert!(payment.transition(PaymentStatus::Pending).is_err());
        assert!(payment.transition(PaymentStatus::Failed).is_ok());
        assert!(payment.status.is_terminal());
    }

    #[test]
    fn completed_is_terminal() {
        let mut payment = pending();
        assert!(payment.transition(PaymentStatus::Completed).is_ok());
        assert!(matches!(
            payment.transition(PaymentStatus::Failed),
            Err(ApiError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn ticket_number_embeds_reference() {
        assert_eq!(ticket_number_for("ALU-000001-AB12"), "TKT-ALU-000001-AB12");
    }
}
