//! Outbound payment gateway integration.

pub mod paystack;

pub use paystack::{PaystackClient, WebhookEvent, verify_webhook_signature};
