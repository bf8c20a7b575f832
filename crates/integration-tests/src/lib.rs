//! Integration tests for the Mailchimp checkout integration.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p commerce-mailchimp-integration-tests
//! ```
//!
//! No database or Mailchimp account is needed: the Mailchimp API is a
//! `wiremock` server and orders live in the in-memory order store. Requests go
//! through the real axum router.
//!
//! # Test Categories
//!
//! - `checkout_pipeline` - Opt-in, verification, and finalization end to end
//! - `http_surface` - Health, inactive integration, admin metadata

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use commerce_mailchimp_checkout::config::MailchimpConfig;
use commerce_mailchimp_checkout::mailchimp::{Region, member_hash};
use commerce_mailchimp_checkout::routes;
use commerce_mailchimp_checkout::state::{AppState, Mailchimp};
use commerce_mailchimp_checkout::store::MemoryOrderStore;
use commerce_mailchimp_core::{AddressType, Email, GroupSelections, ListId};
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// List the tests subscribe to.
pub const LIST_ID: &str = "a1b2c3";

/// API key of the test account (region `us6`).
pub const API_KEY: &str = "0123456789abcdef-us6";

/// A running service against a mock Mailchimp API.
pub struct TestContext {
    pub server: MockServer,
    pub orders: Arc<MemoryOrderStore>,
    pub app: Router,
}

impl TestContext {
    /// Service with single opt-in.
    pub async fn new() -> Self {
        Self::with_double_opt_in(false).await
    }

    /// Service with the given double opt-in setting.
    pub async fn with_double_opt_in(double_opt_in: bool) -> Self {
        let server = MockServer::start().await;
        let config = mailchimp_config(&server, double_opt_in);
        let orders = Arc::new(MemoryOrderStore::new());

        let mailchimp =
            Mailchimp::from_config(&config, orders.clone()).expect("Failed to build client");
        let app = routes::app(AppState::new(None, Some(mailchimp)));

        Self {
            server,
            orders,
            app,
        }
    }

    /// POST a JSON body and return status and JSON response.
    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request");
        send(&self.app, request).await
    }

    /// GET and return status and JSON response.
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        get(&self.app, uri).await
    }

    /// Run the before-step hook with the given billing email.
    pub async fn before_step(
        &self,
        order_id: i64,
        step: &str,
        opt_in: bool,
        email: &str,
    ) -> Value {
        let mut form = serde_json::Map::new();
        if opt_in {
            form.insert("mailchimp_opt_in".to_string(), json!("on"));
        }

        let (status, body) = self
            .post(
                &format!("/checkout/{order_id}/steps/{step}/before"),
                &json!({ "form": form, "billing_address": billing(email) }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "before step failed: {body}");
        body
    }

    /// Place the order (`cart -> processing`) and return the attached field.
    pub async fn place_order(&self, order_id: i64, email: &str) -> Value {
        let (status, body) = self
            .post(
                &format!("/orders/{order_id}/transitions"),
                &json!({
                    "from": "cart",
                    "to": "processing",
                    "billing_address": billing(email),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "transition failed: {body}");
        body
    }
}

/// Mailchimp configuration pointing at `server`.
#[must_use]
pub fn mailchimp_config(server: &MockServer, double_opt_in: bool) -> MailchimpConfig {
    MailchimpConfig {
        api_key: SecretString::from(API_KEY),
        region: Region::from_api_key(API_KEY).expect("valid test key"),
        list_id: ListId::new(LIST_ID),
        address_type: AddressType::Billing,
        double_opt_in,
        groups: GroupSelections::default(),
        api_host: "mailchimp.com".to_string(),
        api_base_url: Some(format!("{}/3.0/", server.uri())),
    }
}

/// Billing address JSON for `email`.
#[must_use]
pub fn billing(email: &str) -> Value {
    json!({
        "email": email,
        "firstname": "Ada",
        "lastname": "Lovelace",
    })
}

/// Path of the member resource for `email` on the test list.
#[must_use]
pub fn member_path(email: &str) -> String {
    let email = Email::parse(email).expect("valid test email");
    format!("/3.0/lists/{LIST_ID}/members/{}", member_hash(&email))
}

/// Path new members are posted to.
#[must_use]
pub fn subscribe_path() -> String {
    format!("/3.0/lists/{LIST_ID}/members/")
}

/// Expect `times` membership checks for `email`, answering as a member.
pub async fn mock_member(server: &MockServer, email: &str, web_id: u64, times: u64) {
    Mock::given(method("GET"))
        .and(path(member_path(email)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "member-id",
            "email_address": email,
            "web_id": web_id,
            "status": "subscribed",
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Expect `times` membership checks for `email`, answering with `status`.
pub async fn mock_member_status(server: &MockServer, email: &str, status: u16, times: u64) {
    Mock::given(method("GET"))
        .and(path(member_path(email)))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "title": "Resource Not Found",
            "status": status,
            "detail": "The requested resource could not be found.",
        })))
        .expect(times)
        .mount(server)
        .await;
}

/// Build the router with no integration configured.
#[must_use]
pub fn inactive_app() -> Router {
    routes::app(AppState::new(None, None))
}

/// GET `uri` on `app`.
pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request");
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");

    // Non-JSON bodies (e.g. health "ok") come back as a JSON string
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}
