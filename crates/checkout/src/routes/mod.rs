//! HTTP route handlers for the checkout integration.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                   - Liveness
//! GET  /health/ready                             - Readiness (database ping)
//!
//! # Checkout extension points (mounted only when Mailchimp is configured)
//! POST /checkout/{order_id}/steps/{step}/before  - Opt-in + verification
//! POST /checkout/{order_id}/steps/{step}/after   - Display flags
//! POST /orders/{order_id}/transitions            - Finalize on cart -> processing
//!
//! # Admin metadata (mounted only when Mailchimp is configured)
//! GET  /admin/mailchimp/lists                    - Lists on the account
//! GET  /admin/mailchimp/lists/{list_id}/categories - Categories with groups
//! ```

pub mod admin;
pub mod checkout;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{
    Router,
    routing::{get, post},
};

use crate::state::{AppState, Mailchimp};

/// Build the full application router.
///
/// The extension points are left out when the integration is not configured;
/// the host checkout then runs without it.
pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness));

    if let Some(mailchimp) = state.mailchimp() {
        router = router.merge(mailchimp_routes().with_state(mailchimp.clone()));
    }

    router.with_state(state)
}

/// Routes backed by the configured integration.
pub fn mailchimp_routes() -> Router<Mailchimp> {
    Router::new()
        .route(
            "/checkout/{order_id}/steps/{step}/before",
            post(checkout::before_step),
        )
        .route(
            "/checkout/{order_id}/steps/{step}/after",
            post(checkout::after_step),
        )
        .route("/orders/{order_id}/transitions", post(checkout::transition))
        .route("/admin/mailchimp/lists", get(admin::lists))
        .route(
            "/admin/mailchimp/lists/{list_id}/categories",
            get(admin::categories),
        )
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity when orders are stored in `PostgreSQL`.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };

    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
