//! OpenAPI document covering every REST endpoint.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{
    account, admin, alumni, checkin, events, networking, payments, registrations, system,
};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated API description served at `/api-docs/openapi.json`.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "alumni-hub",
        description = "Event registration, ticketing, payments and QR check-in for an alumni association."
    ),
    paths(
        system::health_handler,
        events::list_events,
        events::overview,
        events::create_event,
        events::get_event,
        events::update_event,
        events::delete_event,
        events::change_status,
        events::event_stats,
        registrations::create_registration,
        registrations::my_registrations,
        registrations::get_registration,
        registrations::cancel_registration,
        registrations::get_ticket,
        registrations::start_checkout,
        registrations::declare_bank_transfer,
        payments::verify_payment,
        payments::bank_account,
        payments::paystack_webhook,
        checkin::scan_badge,
        checkin::recent_scans,
        checkin::checked_in,
        alumni::list_alumni,
        alumni::get_profile,
        alumni::upsert_own_profile,
        networking::request_connection,
        networking::my_connections,
        networking::respond_connection,
        networking::accept_connection,
        account::me,
        account::inbox,
        account::mark_read,
        account::contact,
        admin::list_registrations,
        admin::export_registrations,
        admin::set_registration_status,
        admin::list_payments,
        admin::verify_bank_transfer,
        admin::list_messages,
        admin::send_message,
        admin::set_message_status,
        admin::edit_profile,
        admin::analytics,
        admin::activity_log,
        admin::site_config,
        admin::update_site_config,
    ),
    components(schemas(ErrorResponse, ErrorBody)),
    modifiers(&BearerAuth),
    tags(
        (name = "System", description = "Service health"),
        (name = "Events", description = "Event catalogue and lifecycle"),
        (name = "Registrations", description = "Sign-up, cancellation and tickets"),
        (name = "Payments", description = "Card checkout, bank transfers and gateway webhooks"),
        (name = "Check-in", description = "Badge scanning at the door"),
        (name = "Alumni", description = "Alumni directory and connections"),
        (name = "Account", description = "Caller's account, inbox and contact form"),
        (name = "Admin", description = "Administration dashboards"),
        (name = "Site", description = "Public site configuration"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` JWT scheme referenced by protected endpoints.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
