//! End-to-end tests driving the full router in-process, persistence off.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tower::ServiceExt;

use alumni_hub::api;
use alumni_hub::app_state::AppState;
use alumni_hub::auth::JwtManager;
use alumni_hub::config::ServiceConfig;
use alumni_hub::domain::{ActivityBus, Role, Store, User, UserId};
use alumni_hub::gateway::paystack::{SIGNATURE_HEADER, sign_webhook_body};
use alumni_hub::persistence::PersistenceHandle;

const JWT_SECRET: &str = "integration-test-secret";
const PAYSTACK_SECRET: &str = "sk_test_integration";

struct TestApp {
    router: Router,
    jwt: JwtManager,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(ServiceConfig::for_tests(JWT_SECRET))
    }

    fn with_gateway() -> Self {
        let mut config = ServiceConfig::for_tests(JWT_SECRET);
        config.payment.paystack_secret_key = Some(PAYSTACK_SECRET.to_string());
        config.payment.paystack_base_url = "http://127.0.0.1:9".to_string();
        Self::with_config(config)
    }

    fn with_config(config: ServiceConfig) -> Self {
        let Ok(state) = AppState::build(
            &config,
            Arc::new(Store::new()),
            ActivityBus::new(config.activity_bus_capacity),
            PersistenceHandle::disabled(),
            None,
        ) else {
            panic!("state should build");
        };
        Self {
            router: api::build_app(state, &config),
            jwt: JwtManager::new(JWT_SECRET.as_bytes()),
        }
    }

    fn token(&self, role: Role) -> String {
        self.identity(role).0
    }

    /// Issues a token and returns it with the subject id.
    fn identity(&self, role: Role) -> (String, String) {
        let id = UserId::new();
        let user = User::new(
            id,
            format!("{id}@example.org"),
            format!("Test {role}"),
            role,
        );
        let Ok(token) = self.jwt.issue(&user, 3_600) else {
            panic!("token should be issued");
        };
        (token, id.to_string())
    }

    async fn raw(&self, request: Request<Body>) -> (StatusCode, header::HeaderMap, Vec<u8>) {
        let Ok(response) = self.router.clone().oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let headers = response.headers().clone();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        (status, headers, bytes.to_vec())
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let Ok(request) = builder.body(body) else {
            panic!("request should build");
        };
        let (status, _, bytes) = self.raw(request).await;
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Creates a published event and returns its id.
    async fn published_event(&self, admin: &str, title: &str, price: &str, tags: &[&str]) -> String {
        let start = Utc::now() + chrono::Duration::days(30);
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/events",
                Some(admin),
                Some(json!({
                    "title": title,
                    "start_date": start,
                    "end_date": start + chrono::Duration::hours(6),
                    "venue": "Main Hall",
                    "capacity": 50,
                    "price": price,
                    "tags": tags,
                    "status": "PUBLISHED",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create event: {body}");
        let Some(id) = body["id"].as_str() else {
            panic!("event id missing: {body}");
        };
        id.to_string()
    }

    async fn register(&self, member: &str, event_id: &str) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/api/v1/registrations",
            Some(member),
            Some(json!({ "event_id": event_id })),
        )
        .await
    }
}

#[tokio::test]
async fn health_reports_version() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn protected_endpoints_require_a_token() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/api/v1/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 1101);

    let (status, _) = app
        .call(Method::GET, "/api/v1/me", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let member = app.token(Role::Member);
    let (status, _) = app
        .call(Method::GET, "/api/v1/admin/analytics", Some(&member), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn free_registration_is_confirmed_and_duplicates_rejected() {
    let app = TestApp::new();
    let admin = app.token(Role::Admin);
    let member = app.token(Role::Member);
    let event_id = app.published_event(&admin, "Founders Day", "0", &[]).await;

    let (status, receipt) = app.register(&member, &event_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["registration"]["status"], "CONFIRMED");
    assert_eq!(receipt["requires_payment"], false);
    assert!(receipt["ticket"]["qr_code"].is_string());

    let (status, body) = app.register(&member, &event_id).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, mine) = app
        .call(Method::GET, "/api/v1/registrations/me", Some(&member), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn bank_transfer_approval_issues_ticket() {
    let app = TestApp::new();
    let admin = app.token(Role::Admin);
    let member = app.token(Role::Member);
    let event_id = app.published_event(&admin, "Gala Night", "5000", &[]).await;

    let (status, receipt) = app.register(&member, &event_id).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["requires_payment"], true);
    let Some(registration_id) = receipt["registration"]["id"].as_str() else {
        panic!("registration id missing");
    };
    let Some(payment_id) = receipt["payment"]["id"].as_str() else {
        panic!("payment id missing");
    };

    let ticket_uri = format!("/api/v1/registrations/{registration_id}/ticket");
    let (status, _) = app.call(Method::GET, &ticket_uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, declared) = app
        .call(
            Method::POST,
            &format!("/api/v1/registrations/{registration_id}/bank-transfer"),
            Some(&member),
            Some(json!({ "account_name": "Ada Obi", "bank_name": "First Bank" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{declared}");
    assert_eq!(declared["payment"]["status"], "BANK_TRANSFER_PENDING");

    let (status, payment) = app
        .call(
            Method::POST,
            &format!("/api/v1/admin/payments/{payment_id}/verify"),
            Some(&admin),
            Some(json!({ "approved": true, "notes": "seen on statement" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{payment}");
    assert_eq!(payment["status"], "COMPLETED");

    let (status, ticket) = app.call(Method::GET, &ticket_uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(ticket["ticket_number"].is_string());

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/admin/payments/{payment_id}/verify"),
            Some(&admin),
            Some(json!({ "approved": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn badge_scans_reject_repeats_and_tampering() {
    let app = TestApp::new();
    let admin = app.token(Role::Admin);
    let organizer = app.token(Role::Organizer);
    let member = app.token(Role::Member);
    let event_id = app.published_event(&admin, "Homecoming", "0", &[]).await;
    let (_, receipt) = app.register(&member, &event_id).await;
    let Some(qr_code) = receipt["ticket"]["qr_code"].as_str() else {
        panic!("ticket missing: {receipt}");
    };

    let scan = |code: String| json!({ "code": code, "event_id": event_id });

    let (status, _) = app
        .call(Method::POST, "/api/v1/checkin/scan", Some(&member), Some(scan(qr_code.to_string())))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, first) = app
        .call(Method::POST, "/api/v1/checkin/scan", Some(&organizer), Some(scan(qr_code.to_string())))
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["first_checkin"], true);

    let (status, again) = app
        .call(Method::POST, "/api/v1/checkin/scan", Some(&organizer), Some(scan(qr_code.to_string())))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["error"]["code"], 2102);

    let Ok(mut payload) = serde_json::from_str::<Value>(qr_code) else {
        panic!("qr code should be JSON");
    };
    payload["user_id"] = json!(UserId::new());
    let (status, tampered) = app
        .call(Method::POST, "/api/v1/checkin/scan", Some(&organizer), Some(scan(payload.to_string())))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(tampered["error"]["code"], 1002);

    let (status, summary) = app
        .call(
            Method::GET,
            &format!("/api/v1/checkin/events/{event_id}/scans"),
            Some(&organizer),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_scans"], 1);
}

#[tokio::test]
async fn event_filters_combine_with_and() {
    let app = TestApp::new();
    let admin = app.token(Role::Admin);
    let cheap_gala = app.published_event(&admin, "Cheap Gala", "500", &["gala"]).await;
    app.published_event(&admin, "Pricey Gala", "90000", &["gala"]).await;
    app.published_event(&admin, "Cheap Picnic", "500", &["picnic"]).await;

    let (status, page) = app
        .call(Method::GET, "/api/v1/events?tags=gala&max_price=1000", None, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["id"], cheap_gala.as_str());

    let (status, page) = app
        .call(Method::GET, "/api/v1/events?tags=gala,picnic&sort_by=title", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"][0]["title"], "Cheap Gala");

    let (status, _) = app
        .call(Method::GET, "/api/v1/events?min_price=10&max_price=1", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn csv_export_matches_filtered_rows() {
    let app = TestApp::new();
    let admin = app.token(Role::Admin);
    let event_id = app.published_event(&admin, "Reunion", "0", &[]).await;
    let other_event = app.published_event(&admin, "Other", "0", &[]).await;
    for _ in 0..2 {
        let (status, _) = app.register(&app.token(Role::Member), &event_id).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = app.register(&app.token(Role::Member), &other_event).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, page) = app
        .call(
            Method::GET,
            &format!("/api/v1/admin/registrations?event_id={event_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);

    let Ok(request) = Request::builder()
        .uri(format!("/api/v1/admin/registrations/export?event_id={event_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .body(Body::empty())
    else {
        panic!("request should build");
    };
    let (status, headers, bytes) = app.raw(request).await;
    assert_eq!(status, StatusCode::OK);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/csv"));
    assert!(headers.contains_key(header::CONTENT_DISPOSITION));

    let csv = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = csv.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 3, "header plus one row per registration");
    assert!(lines[0].starts_with("registration_id,"));
}

#[tokio::test]
async fn webhook_checks_signature_and_confirms_once() {
    let app = TestApp::with_gateway();
    let admin = app.token(Role::Admin);
    let member = app.token(Role::Member);
    let event_id = app.published_event(&admin, "Dinner", "5000", &[]).await;
    let (_, receipt) = app.register(&member, &event_id).await;
    let Some(reference) = receipt["payment"]["reference"].as_str() else {
        panic!("reference missing: {receipt}");
    };
    let Some(registration_id) = receipt["registration"]["id"].as_str() else {
        panic!("registration id missing");
    };

    let body = json!({
        "event": "charge.success",
        "data": { "reference": reference, "status": "success", "amount": 500_000, "currency": "NGN" }
    })
    .to_string();

    let webhook = |signature: Option<String>| {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/webhooks/paystack")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        let Ok(request) = builder.body(Body::from(body.clone())) else {
            panic!("request should build");
        };
        request
    };

    let (status, _, _) = app.raw(webhook(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = app.raw(webhook(Some("deadbeef".to_string()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let Ok(signature) = sign_webhook_body(PAYSTACK_SECRET, body.as_bytes()) else {
        panic!("signing failed");
    };
    let (status, _, bytes) = app.raw(webhook(Some(signature.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    let Ok(report) = serde_json::from_slice::<Value>(&bytes) else {
        panic!("report should be JSON");
    };
    assert_eq!(report["outcome"], "confirmed");

    let (status, _, bytes) = app.raw(webhook(Some(signature))).await;
    assert_eq!(status, StatusCode::OK);
    let Ok(replay) = serde_json::from_slice::<Value>(&bytes) else {
        panic!("report should be JSON");
    };
    assert_eq!(replay["outcome"], "already_settled");

    let (status, detail) = app
        .call(
            Method::GET,
            &format!("/api/v1/registrations/{registration_id}"),
            Some(&member),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["registration"]["status"], "CONFIRMED");
    assert!(detail["ticket"].is_object());
}

#[tokio::test]
async fn webhook_without_gateway_is_unavailable() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/webhooks/paystack",
            None,
            Some(json!({ "event": "charge.success", "data": { "reference": "x", "status": "success" } })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], 3003);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new();
    let (status, doc) = app
        .call(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/registrations"].is_object());
}

#[tokio::test]
async fn live_feed_streams_subscribed_activities() {
    let app = TestApp::new();
    let admin = app.token(Role::Admin);
    let member = app.token(Role::Member);
    let event_id = app.published_event(&admin, "Live", "0", &[]).await;

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    let server = app.router.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, server).await;
    });

    let member_url = format!("ws://{addr}/ws?token={member}");
    assert!(tokio_tungstenite::connect_async(member_url).await.is_err());

    let url = format!("ws://{addr}/ws?token={admin}");
    let Ok((mut socket, _)) = tokio_tungstenite::connect_async(url).await else {
        panic!("ws connect failed");
    };
    let subscribe = json!({
        "id": "sub-1",
        "type": "command",
        "payload": { "command": "subscribe", "event_ids": [event_id] }
    });
    let sent = socket
        .send(tokio_tungstenite::tungstenite::Message::text(subscribe.to_string()))
        .await;
    assert!(sent.is_ok());

    let next_json = |msg: Option<Result<tokio_tungstenite::tungstenite::Message, _>>| {
        let Some(Ok(msg)) = msg else {
            panic!("socket closed");
        };
        let Ok(text) = msg.to_text() else {
            panic!("expected text frame");
        };
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            panic!("expected JSON");
        };
        value
    };

    let ack = next_json(socket.next().await);
    assert_eq!(ack["type"], "response");
    assert_eq!(ack["id"], "sub-1");

    let (status, _) = app.register(&member, &event_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let Ok(frame) = tokio::time::timeout(Duration::from_secs(5), socket.next()).await else {
        panic!("no activity received");
    };
    let activity = next_json(frame);
    assert_eq!(activity["type"], "event");
    assert_eq!(activity["payload"]["activity_type"], "registration_created");
    assert_eq!(activity["payload"]["event_id"], event_id.as_str());
}

#[tokio::test]
async fn connection_request_is_answered_once() {
    let app = TestApp::new();
    let (alice, _) = app.identity(Role::Member);
    let (bob, bob_id) = app.identity(Role::Member);
    let (status, _) = app
        .call(
            Method::PUT,
            "/api/v1/me/profile",
            Some(&bob),
            Some(json!({ "display_name": "Bob", "graduation_year": 2012 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let connect = format!("/api/v1/alumni/{bob_id}/connect");
    let (status, conn) = app
        .call(
            Method::POST,
            &connect,
            Some(&alice),
            Some(json!({ "message": "Same squadron" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{conn}");
    assert_eq!(conn["status"], "PENDING");

    let (status, body) = app
        .call(Method::POST, &connect, Some(&alice), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], 2102);

    let (status, page) = app
        .call(Method::GET, "/api/v1/me/connections", Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["status"], "PENDING");
    assert_eq!(page["items"][0]["incoming"], true);

    let Some(conn_id) = conn["id"].as_str() else {
        panic!("connection id missing: {conn}");
    };
    let accept = format!("/api/v1/me/connections/{conn_id}/accept");
    let (status, _) = app.call(Method::POST, &accept, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, accepted) = app.call(Method::POST, &accept, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "ACCEPTED");

    let (status, _) = app
        .call(
            Method::POST,
            &format!("/api/v1/me/connections/{conn_id}/respond"),
            Some(&bob),
            Some(json!({ "status": "DECLINED" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, page) = app
        .call(
            Method::GET,
            "/api/v1/me/connections?status=ACCEPTED",
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["peer_name"], "Bob");
}
