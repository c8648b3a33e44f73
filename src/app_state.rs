//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::JwtManager;
use crate::config::ServiceConfig;
use crate::domain::{ActivityBus, BadgeSigner, Store};
use crate::error::ApiError;
use crate::gateway::PaystackClient;
use crate::persistence::{PersistenceHandle, PostgresPersistence};
use crate::service::{
    AccountService, AdminService, CheckinService, DirectoryService, EventService, MessageService,
    NetworkingService, PaymentService, RegistrationService, ServiceContext,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Bearer-token validation.
    pub jwt: Arc<JwtManager>,
    /// Activity bus for WebSocket subscriptions.
    pub bus: ActivityBus,
    /// Local user records.
    pub accounts: Arc<AccountService>,
    /// Event catalogue.
    pub events: Arc<EventService>,
    /// Registrations and tickets.
    pub registrations: Arc<RegistrationService>,
    /// Card and bank-transfer payments.
    pub payments: Arc<PaymentService>,
    /// Door scanning.
    pub checkin: Arc<CheckinService>,
    /// Alumni directory.
    pub directory: Arc<DirectoryService>,
    /// Contact form and inbox.
    pub messages: Arc<MessageService>,
    /// Member-to-member connections.
    pub networking: Arc<NetworkingService>,
    /// Dashboards and site configuration.
    pub admin: Arc<AdminService>,
}

impl AppState {
    /// Wires every service around one store, bus and persistence handle.
    ///
    /// `db` backs the stored activity log; pass `None` when persistence is
    /// off.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Internal`] if the payment gateway client cannot
    /// be built.
    pub fn build(
        config: &ServiceConfig,
        store: Arc<Store>,
        bus: ActivityBus,
        persistence: PersistenceHandle,
        db: Option<PostgresPersistence>,
    ) -> Result<Self, ApiError> {
        let ctx = ServiceContext::new(
            store,
            bus.clone(),
            persistence,
            Duration::from_secs(config.stats_cache_ttl_secs),
        );
        let signer = Arc::new(BadgeSigner::new(&config.qr_signing_secret));
        let payment = &config.payment;

        let gateway = match &payment.paystack_secret_key {
            Some(key) => Some(Arc::new(PaystackClient::new(
                key,
                &payment.paystack_base_url,
                Duration::from_secs(payment.gateway_timeout_secs),
            )?)),
            None => {
                tracing::warn!("PAYSTACK_SECRET_KEY not set; card payments disabled");
                None
            }
        };

        Ok(Self {
            jwt: Arc::new(JwtManager::new(config.jwt_secret.as_bytes())),
            bus,
            accounts: Arc::new(AccountService::new(ctx.clone())),
            events: Arc::new(EventService::new(ctx.clone())),
            registrations: Arc::new(RegistrationService::new(
                ctx.clone(),
                Arc::clone(&signer),
                payment.currency.clone(),
                payment.reference_prefix.clone(),
            )),
            payments: Arc::new(PaymentService::new(
                ctx.clone(),
                Arc::clone(&signer),
                gateway,
                payment.callback_url.clone(),
                payment.bank_account.clone(),
            )),
            checkin: Arc::new(CheckinService::new(ctx.clone(), signer)),
            directory: Arc::new(DirectoryService::new(ctx.clone())),
            messages: Arc::new(MessageService::new(ctx.clone())),
            networking: Arc::new(NetworkingService::new(ctx.clone())),
            admin: Arc::new(AdminService::new(ctx, db)),
        })
    }
}
