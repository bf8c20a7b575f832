//! Database operations for the checkout `PostgreSQL` schema.
//!
//! # Schema: `checkout`
//!
//! The host order system owns orders; this service only keeps what the
//! integration writes onto them:
//!
//! ## Tables
//!
//! - `order_property` - Order property bag (`order_id`, `key`, JSONB `value`)
//! - `order_field` - Display fields attached to orders
//!
//! # Migrations
//!
//! Migrations are stored in `crates/checkout/migrations/` and run via:
//! ```bash
//! cargo run -p commerce-mailchimp-cli -- migrate
//! ```

mod orders;

pub use orders::PgOrderStore;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
