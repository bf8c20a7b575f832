//! Mailchimp checkout integration service.
//!
//! This binary serves the checkout extension points on port 3002.
//!
//! # Architecture
//!
//! - Axum JSON endpoints called by the host checkout controller
//! - Mailchimp Marketing API over `reqwest` (membership check, subscribe)
//! - `PostgreSQL` for the order properties and fields the integration writes
//!
//! An incomplete Mailchimp configuration does not stop the service: the
//! integration stays inactive and only the health endpoints are served.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use commerce_mailchimp_checkout::config::{CheckoutConfig, MailchimpConfig};
use commerce_mailchimp_checkout::db::{self, PgOrderStore};
use commerce_mailchimp_checkout::routes;
use commerce_mailchimp_checkout::state::{AppState, Mailchimp};
use commerce_mailchimp_checkout::store::OrderPropertyBag;
use sentry::integrations::tracing as sentry_tracing;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CheckoutConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = CheckoutConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "commerce_mailchimp_checkout=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p commerce-mailchimp-cli -- migrate

    let orders: Arc<dyn OrderPropertyBag> = Arc::new(PgOrderStore::new(pool.clone()));

    let mailchimp = match MailchimpConfig::from_env() {
        Ok(mc_config) => match Mailchimp::from_config(&mc_config, orders) {
            Ok(mailchimp) => {
                tracing::info!(
                    region = %mc_config.region,
                    list_id = %mc_config.list_id,
                    address_type = %mc_config.address_type,
                    "Mailchimp integration active"
                );
                Some(mailchimp)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to build Mailchimp client, integration inactive");
                None
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Mailchimp is not configured, integration inactive");
            None
        }
    };

    let state = AppState::new(Some(pool), mailchimp);

    let app = routes::app(state)
        .layer(TraceLayer::new_for_http())
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("checkout listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
