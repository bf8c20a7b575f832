//! Application state shared across handlers.

use std::sync::Arc;

use commerce_mailchimp_core::{GroupSelections, ListId};
use sqlx::PgPool;

use crate::config::MailchimpConfig;
use crate::mailchimp::{MailchimpClient, MailchimpError, MetadataCache, SubscriptionProvider};
use crate::pipeline::{CheckoutPipeline, PipelineSettings};
use crate::store::{OrderPropertyBag, SubscriptionStateStore};

/// The configured integration: pipeline plus admin lookups.
#[derive(Clone)]
pub struct Mailchimp {
    pub pipeline: CheckoutPipeline,
    pub metadata: MetadataCache,
    pub list_id: ListId,
    pub groups: GroupSelections,
}

impl Mailchimp {
    /// Wire the integration from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `MailchimpError` if the HTTP client cannot be built.
    pub fn from_config(
        config: &MailchimpConfig,
        orders: Arc<dyn OrderPropertyBag>,
    ) -> Result<Self, MailchimpError> {
        let client = MailchimpClient::new(config)?;
        let provider: Arc<dyn SubscriptionProvider> = Arc::new(client.clone());
        Ok(Self::new(provider, MetadataCache::new(client), config, orders))
    }

    /// Wire the integration around an existing provider.
    #[must_use]
    pub fn new(
        provider: Arc<dyn SubscriptionProvider>,
        metadata: MetadataCache,
        config: &MailchimpConfig,
        orders: Arc<dyn OrderPropertyBag>,
    ) -> Self {
        let store = SubscriptionStateStore::new(orders);
        Self {
            pipeline: CheckoutPipeline::new(provider, store, PipelineSettings::from(config)),
            metadata,
            list_id: config.list_id.clone(),
            groups: config.groups.clone(),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: Option<PgPool>,
    mailchimp: Option<Mailchimp>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `mailchimp` is `None` when the integration is not configured; `pool`
    /// is `None` when orders are not stored in `PostgreSQL`.
    #[must_use]
    pub fn new(pool: Option<PgPool>, mailchimp: Option<Mailchimp>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { pool, mailchimp }),
        }
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// The configured integration, if any.
    #[must_use]
    pub fn mailchimp(&self) -> Option<&Mailchimp> {
        self.inner.mailchimp.as_ref()
    }
}
