//! Payment service: card checkout through the gateway, signed webhooks,
//! manual bank transfers and their admin verification.
//!
//! Gateway calls never run under the store lock: the service reads what it
//! needs, releases the lock, talks to the gateway, then re-acquires the
//! lock and re-checks the payment before writing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::registration_service::{close_registration, confirm_registration};
use super::{Outbox, Page, ServiceContext};
use crate::auth::AuthUser;
use crate::config::BankAccount;
use crate::domain::{
    Activity, BadgeSigner, BankTransferDetails, EventId, Payment, PaymentId, PaymentMethod,
    PaymentStatus, RegistrationId, RegistrationStatus, StoreState,
};
use crate::error::ApiError;
use crate::gateway::paystack::{InitializeRequest, TransactionData, to_minor_units};
use crate::gateway::{PaystackClient, WebhookEvent, verify_webhook_signature};
use crate::persistence::Record;

/// Hosted checkout session for a card payment.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSession {
    /// Payment identifier.
    pub payment_id: PaymentId,
    /// Payment reference.
    pub reference: String,
    /// URL to redirect the payer to.
    pub authorization_url: String,
    /// Amount in major units.
    pub amount: rust_decimal::Decimal,
    /// Currency code.
    pub currency: String,
}

/// Body of `POST /registrations/{id}/bank-transfer`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BankTransferRequest {
    /// Name on the sending account.
    pub account_name: String,
    /// Sending bank.
    pub bank_name: Option<String>,
    /// Transfer reference or teller number.
    pub transfer_reference: Option<String>,
    /// Date the transfer was made.
    pub transfer_date: Option<DateTime<Utc>>,
}

/// Result of announcing a bank transfer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BankTransferReceipt {
    /// Payment, now awaiting verification.
    pub payment: Payment,
    /// Account to pay into.
    pub bank_account: BankAccount,
}

/// Body of the admin bank-transfer verification.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyBankTransfer {
    /// Approve (`true`) or reject (`false`) the transfer.
    pub approved: bool,
    /// Admin notes kept on the payment.
    pub notes: Option<String>,
}

/// Filter of the admin payment table.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentFilter {
    /// Only this status.
    pub status: Option<PaymentStatus>,
    /// Only this channel.
    pub method: Option<PaymentMethod>,
    /// Only payments for this event.
    pub event_id: Option<EventId>,
    /// Items to skip.
    #[serde(default)]
    pub offset: usize,
    /// Page size (1..=100, default 20).
    pub limit: Option<usize>,
}

/// What a gateway notification or verification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Payment completed and registration confirmed.
    Confirmed,
    /// Payment failed and registration marked `PAYMENT_FAILED`.
    Failed,
    /// The payment was already settled; nothing changed.
    AlreadySettled,
    /// The gateway has no final answer yet.
    Pending,
    /// Notification not relevant to any payment.
    Ignored,
}

/// Payment status after a settlement attempt.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettlementReport {
    /// What happened.
    pub outcome: SettlementOutcome,
    /// Payment reference.
    pub reference: String,
    /// Payment status afterwards.
    pub payment_status: Option<PaymentStatus>,
    /// Registration status afterwards.
    pub registration_status: Option<RegistrationStatus>,
}

/// Payment operations.
#[derive(Debug, Clone)]
pub struct PaymentService {
    ctx: ServiceContext,
    signer: Arc<BadgeSigner>,
    gateway: Option<Arc<PaystackClient>>,
    callback_url: Option<String>,
    bank_account: BankAccount,
}

impl PaymentService {
    /// Creates a new `PaymentService`. Card payments and webhooks are
    /// unavailable when `gateway` is `None`.
    #[must_use]
    pub fn new(
        ctx: ServiceContext,
        signer: Arc<BadgeSigner>,
        gateway: Option<Arc<PaystackClient>>,
        callback_url: Option<String>,
        bank_account: BankAccount,
    ) -> Self {
        Self {
            ctx,
            signer,
            gateway,
            callback_url,
            bank_account,
        }
    }

    fn gateway(&self) -> Result<&PaystackClient, ApiError> {
        self.gateway.as_deref().ok_or(ApiError::GatewayNotConfigured)
    }

    /// Account payers should transfer to.
    #[must_use]
    pub fn bank_account(&self) -> &BankAccount {
        &self.bank_account
    }

    /// Starts (or resumes) a hosted card checkout for the caller's pending
    /// registration.
    ///
    /// # Errors
    ///
    /// - [`ApiError::GatewayNotConfigured`] without a gateway.
    /// - [`ApiError::Forbidden`] for someone else's registration.
    /// - [`ApiError::Conflict`] when the payment is no longer payable.
    /// - [`ApiError::PaymentGateway`] when the gateway refuses.
    pub async fn initialize(
        &self,
        auth: &AuthUser,
        registration_id: RegistrationId,
    ) -> Result<CheckoutSession, ApiError> {
        let gateway = self.gateway()?;
        let payment = {
            let state = self.ctx.store.read().await;
            payable(&state, auth, registration_id)?.clone()
        };
        if payment.status != PaymentStatus::Pending {
            return Err(ApiError::Conflict(format!(
                "payment {} is awaiting bank-transfer verification",
                payment.reference
            )));
        }
        if let Some(url) = payment.authorization_url.clone() {
            return Ok(session(&payment, url));
        }

        let request = InitializeRequest {
            email: auth.email.clone(),
            amount: to_minor_units(payment.amount)?,
            reference: payment.reference.clone(),
            currency: payment.currency.clone(),
            callback_url: self.callback_url.clone(),
            metadata: serde_json::json!({
                "userId": auth.id,
                "paymentId": payment.id,
                "registrationId": registration_id,
            }),
        };
        let data = gateway.initialize(&request).await?;

        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let updated = {
            let stored = state
                .payments
                .get_mut(&payment.id)
                .ok_or_else(|| ApiError::PaymentNotFound(payment.reference.clone()))?;
            if stored.status != PaymentStatus::Pending {
                return Err(ApiError::Conflict(format!(
                    "payment {} changed while the checkout was created",
                    stored.reference
                )));
            }
            stored.method = PaymentMethod::Card;
            stored.authorization_url = Some(data.authorization_url.clone());
            stored.updated_at = Utc::now();
            outbox.save(Record::Payment(stored.clone()));
            stored.clone()
        };
        self.ctx.commit(state, outbox).await;
        tracing::info!(reference = %updated.reference, "card checkout initialized");
        Ok(session(&updated, data.authorization_url))
    }

    /// Records a manual bank transfer announced by the payer.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] without an account name,
    /// [`ApiError::Forbidden`] for someone else's registration and
    /// [`ApiError::Conflict`] when the payment is not pending.
    pub async fn bank_transfer(
        &self,
        auth: &AuthUser,
        registration_id: RegistrationId,
        input: BankTransferRequest,
    ) -> Result<BankTransferReceipt, ApiError> {
        if input.account_name.trim().is_empty() {
            return Err(ApiError::InvalidRequest(
                "account_name is required".to_string(),
            ));
        }
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let payment = {
            let payment_id = payable(&state, auth, registration_id)?.id;
            let event_id = state.registration(registration_id)?.event_id;
            let payment = state
                .payments
                .get_mut(&payment_id)
                .ok_or_else(|| ApiError::PaymentNotFound(payment_id.to_string()))?;
            payment.transition(PaymentStatus::BankTransferPending)?;
            payment.method = PaymentMethod::BankTransfer;
            payment.bank_details = Some(BankTransferDetails {
                account_name: input.account_name.trim().to_string(),
                bank_name: input.bank_name,
                transfer_reference: input.transfer_reference,
                transfer_date: input.transfer_date,
            });
            outbox.save(Record::Payment(payment.clone()));
            outbox.publish(Activity::PaymentUpdated {
                event_id,
                payment_id,
                reference: payment.reference.clone(),
                status: payment.status,
                timestamp: payment.updated_at,
            });
            payment.clone()
        };
        self.ctx.commit(state, outbox).await;
        tracing::info!(reference = %payment.reference, "bank transfer reported");
        Ok(BankTransferReceipt {
            payment,
            bank_account: self.bank_account.clone(),
        })
    }

    /// Asks the gateway for the final state of a card payment and applies
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::PaymentNotFound`], [`ApiError::Forbidden`], or
    /// the gateway's error.
    pub async fn verify_reference(
        &self,
        auth: &AuthUser,
        reference: &str,
    ) -> Result<SettlementReport, ApiError> {
        {
            let state = self.ctx.store.read().await;
            let payment = payment_by_reference(&state, reference)?;
            if payment.user_id != auth.id && !auth.is_admin() {
                return Err(ApiError::Forbidden(
                    "payment belongs to another user".to_string(),
                ));
            }
            if payment.status.is_terminal() {
                return Ok(report(&state, reference, SettlementOutcome::AlreadySettled));
            }
        }
        let data = self.gateway()?.verify(reference).await?;
        self.apply_transaction(&data, classify(&data), "verify").await
    }

    /// Handles a gateway webhook. The signature is checked against the raw
    /// body before anything is parsed. Repeated notifications are no-ops.
    ///
    /// # Errors
    ///
    /// - [`ApiError::GatewayNotConfigured`] without a gateway secret.
    /// - [`ApiError::InvalidSignature`] for a missing or wrong signature.
    /// - [`ApiError::InvalidRequest`] for an unreadable body.
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<SettlementReport, ApiError> {
        let secret = self.gateway()?.secret_key();
        let signature = signature.ok_or(ApiError::InvalidSignature)?;
        verify_webhook_signature(secret, body, signature)?;
        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| ApiError::InvalidRequest(format!("malformed webhook body: {e}")))?;

        let outcome = match event.event.as_str() {
            "charge.success" => Verdict::Success,
            "charge.failed" => Verdict::Failure,
            other => {
                tracing::debug!(event = other, reference = %event.data.reference, "webhook ignored");
                return Ok(SettlementReport {
                    outcome: SettlementOutcome::Ignored,
                    reference: event.data.reference,
                    payment_status: None,
                    registration_status: None,
                });
            }
        };
        self.apply_transaction(&event.data, outcome, "webhook").await
    }

    async fn apply_transaction(
        &self,
        data: &TransactionData,
        verdict: Verdict,
        source: &'static str,
    ) -> Result<SettlementReport, ApiError> {
        let reference = data.reference.as_str();
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let report = {
            let Some(payment) = state
                .payment_id_by_reference(reference)
                .and_then(|id| state.payments.get(&id))
            else {
                tracing::warn!(reference, source, "gateway reported an unknown reference");
                return Ok(SettlementReport {
                    outcome: SettlementOutcome::Ignored,
                    reference: reference.to_string(),
                    payment_status: None,
                    registration_status: None,
                });
            };
            let registration_id = payment.registration_id;

            if payment.status.is_terminal() {
                if (payment.status == PaymentStatus::Completed) != (verdict == Verdict::Success)
                    && verdict != Verdict::Pending
                {
                    tracing::warn!(
                        reference,
                        status = %payment.status,
                        source,
                        "gateway outcome disagrees with a settled payment"
                    );
                }
                report(&state, reference, SettlementOutcome::AlreadySettled)
            } else {
                let outcome = match verdict {
                    Verdict::Pending => SettlementOutcome::Pending,
                    Verdict::Success => {
                        let expected = to_minor_units(payment.amount)?;
                        if data.amount != expected {
                            tracing::warn!(
                                reference,
                                expected,
                                received = data.amount,
                                "amount mismatch; payment left unsettled"
                            );
                            return Err(ApiError::Conflict(format!(
                                "amount {} does not match the expected {expected}",
                                data.amount
                            )));
                        }
                        confirm_registration(
                            &mut state,
                            registration_id,
                            &self.signer,
                            source,
                            serde_json::to_value(data).ok(),
                            &mut outbox,
                        )?;
                        SettlementOutcome::Confirmed
                    }
                    Verdict::Failure => {
                        close_registration(
                            &mut state,
                            registration_id,
                            RegistrationStatus::PaymentFailed,
                            source,
                            serde_json::to_value(data).ok(),
                            &mut outbox,
                        )?;
                        SettlementOutcome::Failed
                    }
                };
                report(&state, reference, outcome)
            }
        };
        self.ctx.commit(state, outbox).await;
        tracing::info!(reference, outcome = ?report.outcome, source, "payment settlement applied");
        Ok(report)
    }

    /// Approves or rejects a reported bank transfer.
    ///
    /// Approval completes the payment, confirms the registration and issues
    /// the ticket; rejection fails both.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins,
    /// [`ApiError::PaymentNotFound`], or [`ApiError::Conflict`] when the
    /// payment is not awaiting verification.
    pub async fn admin_verify_bank_transfer(
        &self,
        admin: &AuthUser,
        payment_id: PaymentId,
        input: VerifyBankTransfer,
    ) -> Result<Payment, ApiError> {
        admin.require_admin()?;
        let mut outbox = Outbox::default();
        let mut state = self.ctx.store.write().await;
        let payment = {
            let payment = state.payment(payment_id)?;
            if payment.status != PaymentStatus::BankTransferPending {
                return Err(ApiError::Conflict(format!(
                    "payment {} is {}, not awaiting bank-transfer verification",
                    payment.reference, payment.status
                )));
            }
            let registration_id = payment.registration_id;
            if input.approved {
                confirm_registration(
                    &mut state,
                    registration_id,
                    &self.signer,
                    "bank_transfer",
                    None,
                    &mut outbox,
                )?;
            } else {
                close_registration(
                    &mut state,
                    registration_id,
                    RegistrationStatus::PaymentFailed,
                    "bank_transfer",
                    None,
                    &mut outbox,
                )?;
            }
            let payment = state
                .payments
                .get_mut(&payment_id)
                .ok_or_else(|| ApiError::PaymentNotFound(payment_id.to_string()))?;
            payment.verified_by = Some(admin.id);
            payment.verification_notes = input.notes.filter(|n| !n.trim().is_empty());
            outbox.save(Record::Payment(payment.clone()));
            payment.clone()
        };
        self.ctx.commit(state, outbox).await;
        tracing::info!(
            reference = %payment.reference,
            approved = input.approved,
            admin = %admin.id,
            "bank transfer verified"
        );
        Ok(payment)
    }

    /// Filtered payment table for admins, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admins.
    pub async fn admin_list(
        &self,
        admin: &AuthUser,
        filter: &PaymentFilter,
    ) -> Result<Page<Payment>, ApiError> {
        admin.require_admin()?;
        let limit = filter
            .limit
            .unwrap_or(super::event_service::DEFAULT_LIMIT)
            .clamp(1, super::event_service::MAX_LIMIT);
        let state = self.ctx.store.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| filter.status.is_none_or(|s| p.status == s))
            .filter(|p| filter.method.is_none_or(|m| p.method == m))
            .filter(|p| {
                filter.event_id.is_none_or(|event| {
                    state
                        .registrations
                        .get(&p.registration_id)
                        .is_some_and(|r| r.event_id == event)
                })
            })
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(Page::slice(payments, filter.offset, limit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Success,
    Failure,
    Pending,
}

fn classify(data: &TransactionData) -> Verdict {
    if data.is_success() {
        Verdict::Success
    } else if matches!(
        data.status.to_ascii_lowercase().as_str(),
        "failed" | "reversed"
    ) {
        Verdict::Failure
    } else {
        Verdict::Pending
    }
}

/// The caller's unsettled payment for a pending registration.
fn payable<'a>(
    state: &'a StoreState,
    auth: &AuthUser,
    registration_id: RegistrationId,
) -> Result<&'a Payment, ApiError> {
    let registration = state.registration(registration_id)?;
    if registration.user_id != auth.id {
        return Err(ApiError::Forbidden(
            "registration belongs to another user".to_string(),
        ));
    }
    if registration.status != RegistrationStatus::Pending {
        return Err(ApiError::Conflict(format!(
            "registration is {}",
            registration.status
        )));
    }
    let payment = state
        .payment_for_registration(registration_id)
        .ok_or_else(|| ApiError::PaymentNotFound(registration.payment_reference.clone()))?;
    if payment.status.is_terminal() || payment.method == PaymentMethod::Free {
        return Err(ApiError::Conflict(format!(
            "payment {} is already {}",
            payment.reference, payment.status
        )));
    }
    Ok(payment)
}

fn payment_by_reference<'a>(state: &'a StoreState, reference: &str) -> Result<&'a Payment, ApiError> {
    state
        .payment_id_by_reference(reference)
        .and_then(|id| state.payments.get(&id))
        .ok_or_else(|| ApiError::PaymentNotFound(reference.to_string()))
}

fn report(state: &StoreState, reference: &str, outcome: SettlementOutcome) -> SettlementReport {
    let payment = payment_by_reference(state, reference).ok();
    SettlementReport {
        outcome,
        reference: reference.to_string(),
        payment_status: payment.map(|p| p.status),
        registration_status: payment
            .and_then(|p| state.registrations.get(&p.registration_id))
            .map(|r| r.status),
    }
}

fn session(payment: &Payment, authorization_url: String) -> CheckoutSession {
    CheckoutSession {
        payment_id: payment.id,
        reference: payment.reference.clone(),
        authorization_url,
        amount: payment.amount,
        currency: payment.currency.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use axum::http::header::AUTHORIZATION;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::event::tests::sample_event;
    use crate::domain::{Role, TicketType};
    use crate::gateway::paystack::sign_webhook_body;
    use crate::service::registration_service::{CreateRegistration, RegistrationService};
    use crate::service::test_support::{context, user};

    const SECRET: &str = "sk_test_webhook";

    struct Fixture {
        payments: PaymentService,
        registrations: RegistrationService,
        event_id: EventId,
    }

    async fn fixture(with_gateway: bool) -> Fixture {
        fixture_at(with_gateway.then_some("http://127.0.0.1:9")).await
    }

    async fn fixture_at(gateway_url: Option<&str>) -> Fixture {
        let ctx = context();
        let signer = Arc::new(BadgeSigner::new("qr-secret"));
        let gateway = gateway_url.map(|url| {
            let Ok(client) = PaystackClient::new(SECRET, url, Duration::from_secs(5)) else {
                panic!("client");
            };
            Arc::new(client)
        });
        let mut event = sample_event();
        event.early_bird_price = None;
        event.early_bird_deadline = None;
        event.price = Decimal::from(20_000);
        let event_id = event.id;
        ctx.store.write().await.events.insert(event_id, event);
        Fixture {
            payments: PaymentService::new(
                ctx.clone(),
                Arc::clone(&signer),
                gateway,
                None,
                BankAccount {
                    account_name: "Alumni Association".to_string(),
                    account_number: "0123456789".to_string(),
                    bank_name: "First Bank".to_string(),
                },
            ),
            registrations: RegistrationService::new(
                ctx,
                signer,
                "NGN".to_string(),
                "ALU".to_string(),
            ),
            event_id,
        }
    }

    async fn register(f: &Fixture, member: &AuthUser) -> (RegistrationId, String) {
        let Ok(receipt) = f
            .registrations
            .create(
                member,
                CreateRegistration {
                    event_id: f.event_id,
                    ticket_type: TicketType::Regular,
                    special_requests: None,
                },
            )
            .await
        else {
            panic!("registration failed");
        };
        (receipt.registration.id, receipt.payment.reference)
    }

    fn webhook(event: &str, reference: &str, amount: i64) -> (Vec<u8>, String) {
        let status = if event == "charge.success" {
            "success"
        } else {
            "failed"
        };
        let body = serde_json::json!({
            "event": event,
            "data": { "reference": reference, "status": status, "amount": amount }
        })
        .to_string()
        .into_bytes();
        let Ok(signature) = sign_webhook_body(SECRET, &body) else {
            panic!("sign");
        };
        (body, signature)
    }

    /// Calls received by [`spawn_gateway`], and what it answers.
    #[derive(Default)]
    struct GatewayStub {
        initialized: AtomicUsize,
        verified: AtomicUsize,
        last_amount: AtomicI64,
        verify_amount: i64,
    }

    /// Serves the two Paystack endpoints the service calls on a local port.
    async fn spawn_gateway(stub: Arc<GatewayStub>) -> String {
        async fn initialize(
            State(stub): State<Arc<GatewayStub>>,
            headers: HeaderMap,
            Json(body): Json<serde_json::Value>,
        ) -> Json<serde_json::Value> {
            assert_eq!(
                headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
                Some(format!("Bearer {SECRET}").as_str())
            );
            stub.initialized.fetch_add(1, Ordering::SeqCst);
            stub.last_amount
                .store(body["amount"].as_i64().unwrap_or(-1), Ordering::SeqCst);
            let reference = body["reference"].as_str().unwrap_or_default();
            Json(serde_json::json!({
                "status": true,
                "message": "Authorization URL created",
                "data": {
                    "authorization_url": format!("https://checkout.test/{reference}"),
                    "access_code": "access-1",
                    "reference": reference,
                }
            }))
        }

        async fn verify(
            State(stub): State<Arc<GatewayStub>>,
            Path(reference): Path<String>,
        ) -> Json<serde_json::Value> {
            stub.verified.fetch_add(1, Ordering::SeqCst);
            Json(serde_json::json!({
                "status": true,
                "message": "Verification successful",
                "data": {
                    "reference": reference,
                    "status": "success",
                    "amount": stub.verify_amount,
                    "currency": "NGN",
                    "channel": "card",
                    "gateway_response": "Approved",
                }
            }))
        }

        let app = Router::new()
            .route("/transaction/initialize", post(initialize))
            .route("/transaction/verify/{reference}", get(verify))
            .with_state(stub);
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind stub gateway");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("stub address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn card_checkout_is_created_once_and_reused() {
        let stub = Arc::new(GatewayStub::default());
        let url = spawn_gateway(Arc::clone(&stub)).await;
        let f = fixture_at(Some(&url)).await;
        let member = user(Role::Member);
        let (registration_id, reference) = register(&f, &member).await;

        let Ok(first) = f.payments.initialize(&member, registration_id).await else {
            panic!("checkout failed");
        };
        assert_eq!(first.reference, reference);
        assert_eq!(first.authorization_url, format!("https://checkout.test/{reference}"));
        assert_eq!(stub.last_amount.load(Ordering::SeqCst), 2_000_000);

        let Ok(second) = f.payments.initialize(&member, registration_id).await else {
            panic!("second checkout failed");
        };
        assert_eq!(second.authorization_url, first.authorization_url);
        assert_eq!(stub.initialized.load(Ordering::SeqCst), 1);

        let state = f.payments.ctx.store.read().await;
        let Ok(payment) = payment_by_reference(&state, &reference) else {
            panic!("payment missing");
        };
        assert_eq!(payment.method, PaymentMethod::Card);
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn verify_against_gateway_confirms_and_issues_ticket() {
        let stub = Arc::new(GatewayStub {
            verify_amount: 2_000_000,
            ..GatewayStub::default()
        });
        let url = spawn_gateway(Arc::clone(&stub)).await;
        let f = fixture_at(Some(&url)).await;
        let member = user(Role::Member);
        let (registration_id, reference) = register(&f, &member).await;
        assert!(f.payments.initialize(&member, registration_id).await.is_ok());

        assert!(matches!(
            f.payments.verify_reference(&user(Role::Member), &reference).await,
            Err(ApiError::Forbidden(_))
        ));
        let Ok(report) = f.payments.verify_reference(&member, &reference).await else {
            panic!("verify failed");
        };
        assert_eq!(report.outcome, SettlementOutcome::Confirmed);
        assert_eq!(report.payment_status, Some(PaymentStatus::Completed));
        {
            let state = f.payments.ctx.store.read().await;
            assert!(state.ticket_for_registration(registration_id).is_some());
            let Ok(payment) = payment_by_reference(&state, &reference) else {
                panic!("payment missing");
            };
            let Some(response) = payment.gateway_response.as_ref() else {
                panic!("gateway response not recorded");
            };
            assert_eq!(response["channel"], "card");
        }

        let Ok(again) = f.payments.verify_reference(&member, &reference).await else {
            panic!("repeat verify failed");
        };
        assert_eq!(again.outcome, SettlementOutcome::AlreadySettled);
        assert_eq!(stub.verified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn verify_with_wrong_amount_leaves_payment_untouched() {
        let stub = Arc::new(GatewayStub {
            verify_amount: 500,
            ..GatewayStub::default()
        });
        let url = spawn_gateway(stub).await;
        let f = fixture_at(Some(&url)).await;
        let member = user(Role::Member);
        let (_, reference) = register(&f, &member).await;
        assert!(matches!(
            f.payments.verify_reference(&member, &reference).await,
            Err(ApiError::Conflict(_))
        ));
        let state = f.payments.ctx.store.read().await;
        let Ok(payment) = payment_by_reference(&state, &reference) else {
            panic!("payment missing");
        };
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.gateway_response.is_none());
    }

    #[tokio::test]
    async fn failed_confirmation_keeps_stored_payment_unchanged() {
        let f = fixture(true).await;
        let (registration_id, reference) = register(&f, &user(Role::Member)).await;
        // Registration closed behind the payment's back: confirming must fail.
        {
            let mut state = f.payments.ctx.store.write().await;
            let Some(registration) = state.registrations.get_mut(&registration_id) else {
                panic!("registration missing");
            };
            registration.status = RegistrationStatus::Cancelled;
        }
        let (body, signature) = webhook("charge.success", &reference, 2_000_000);
        assert!(matches!(
            f.payments.handle_webhook(&body, Some(&signature)).await,
            Err(ApiError::InvalidTransition { .. })
        ));

        let state = f.payments.ctx.store.read().await;
        let Ok(payment) = payment_by_reference(&state, &reference) else {
            panic!("payment missing");
        };
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.gateway_response.is_none());
        assert!(state.ticket_for_registration(registration_id).is_none());
    }

    #[tokio::test]
    async fn webhook_success_confirms_and_repeats_are_noops() {
        let f = fixture(true).await;
        let member = user(Role::Member);
        let (registration_id, reference) = register(&f, &member).await;
        let (body, signature) = webhook("charge.success", &reference, 2_000_000);

        let Ok(first) = f.payments.handle_webhook(&body, Some(&signature)).await else {
            panic!("webhook failed");
        };
        assert_eq!(first.outcome, SettlementOutcome::Confirmed);
        assert_eq!(first.registration_status, Some(RegistrationStatus::Confirmed));

        let Ok(second) = f.payments.handle_webhook(&body, Some(&signature)).await else {
            panic!("repeat failed");
        };
        assert_eq!(second.outcome, SettlementOutcome::AlreadySettled);

        let state = f.payments.ctx.store.read().await;
        assert_eq!(state.tickets.len(), 1);
        assert!(state.ticket_for_registration(registration_id).is_some());
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let f = fixture(true).await;
        let (_, reference) = register(&f, &user(Role::Member)).await;
        let (body, _) = webhook("charge.success", &reference, 2_000_000);
        assert!(matches!(
            f.payments.handle_webhook(&body, Some("deadbeef")).await,
            Err(ApiError::InvalidSignature)
        ));
        assert!(matches!(
            f.payments.handle_webhook(&body, None).await,
            Err(ApiError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn webhook_failure_marks_payment_failed() {
        let f = fixture(true).await;
        let (_, reference) = register(&f, &user(Role::Member)).await;
        let (body, signature) = webhook("charge.failed", &reference, 2_000_000);
        let Ok(report) = f.payments.handle_webhook(&body, Some(&signature)).await else {
            panic!("webhook failed");
        };
        assert_eq!(report.outcome, SettlementOutcome::Failed);
        assert_eq!(report.payment_status, Some(PaymentStatus::Failed));
        assert_eq!(
            report.registration_status,
            Some(RegistrationStatus::PaymentFailed)
        );
    }

    #[tokio::test]
    async fn webhook_amount_mismatch_leaves_payment_pending() {
        let f = fixture(true).await;
        let (_, reference) = register(&f, &user(Role::Member)).await;
        let (body, signature) = webhook("charge.success", &reference, 100);
        assert!(matches!(
            f.payments.handle_webhook(&body, Some(&signature)).await,
            Err(ApiError::Conflict(_))
        ));
        let state = f.payments.ctx.store.read().await;
        let Ok(payment) = payment_by_reference(&state, &reference) else {
            panic!("payment missing");
        };
        assert_eq!(payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn card_checkout_requires_gateway() {
        let f = fixture(false).await;
        let member = user(Role::Member);
        let (registration_id, _) = register(&f, &member).await;
        assert!(matches!(
            f.payments.initialize(&member, registration_id).await,
            Err(ApiError::GatewayNotConfigured)
        ));
        assert!(matches!(
            f.payments.handle_webhook(b"{}", Some("00")).await,
            Err(ApiError::GatewayNotConfigured)
        ));
    }

    #[tokio::test]
    async fn approved_bank_transfer_issues_ticket() {
        let f = fixture(false).await;
        let member = user(Role::Member);
        let admin = user(Role::Admin);
        let (registration_id, _) = register(&f, &member).await;
        let Ok(receipt) = f
            .payments
            .bank_transfer(
                &member,
                registration_id,
                BankTransferRequest {
                    account_name: "Ada Obi".to_string(),
                    bank_name: Some("GTBank".to_string()),
                    transfer_reference: Some("TRF-1".to_string()),
                    transfer_date: None,
                },
            )
            .await
        else {
            panic!("bank transfer failed");
        };
        assert_eq!(receipt.payment.status, PaymentStatus::BankTransferPending);
        assert_eq!(receipt.bank_account.account_number, "0123456789");

        let Ok(payment) = f
            .payments
            .admin_verify_bank_transfer(
                &admin,
                receipt.payment.id,
                VerifyBankTransfer {
                    approved: true,
                    notes: Some("seen on statement".to_string()),
                },
            )
            .await
        else {
            panic!("verification failed");
        };
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.verified_by, Some(admin.id));
        assert!(payment.completed_at.is_some());

        let state = f.payments.ctx.store.read().await;
        let Ok(registration) = state.registration(registration_id) else {
            panic!("registration missing");
        };
        assert_eq!(registration.status, RegistrationStatus::Confirmed);
        assert!(state.ticket_for_registration(registration_id).is_some());
    }

    #[tokio::test]
    async fn rejected_bank_transfer_fails_registration() {
        let f = fixture(false).await;
        let member = user(Role::Member);
        let (registration_id, _) = register(&f, &member).await;
        let Ok(receipt) = f
            .payments
            .bank_transfer(
                &member,
                registration_id,
                BankTransferRequest {
                    account_name: "Ada Obi".to_string(),
                    bank_name: None,
                    transfer_reference: None,
                    transfer_date: None,
                },
            )
            .await
        else {
            panic!("bank transfer failed");
        };
        let admin = user(Role::Admin);
        let verdict = VerifyBankTransfer {
            approved: false,
            notes: None,
        };
        let Ok(payment) = f
            .payments
            .admin_verify_bank_transfer(&admin, receipt.payment.id, verdict.clone())
            .await
        else {
            panic!("rejection failed");
        };
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(matches!(
            f.payments
                .admin_verify_bank_transfer(&admin, receipt.payment.id, verdict)
                .await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn only_owner_reports_bank_transfer() {
        let f = fixture(false).await;
        let (registration_id, _) = register(&f, &user(Role::Member)).await;
        let result = f
            .payments
            .bank_transfer(
                &user(Role::Member),
                registration_id,
                BankTransferRequest {
                    account_name: "Mallory".to_string(),
                    bank_name: None,
                    transfer_reference: None,
                    transfer_date: None,
                },
            )
            .await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }
}
