//! Checkout subscription pipeline.
//!
//! Three hooks drive the integration, each a short ordered sequence of state
//! transitions over the order's [`OrderSubscriptionState`]:
//!
//! 1. Before a tracked step: raise the opt-in, then verify the subscription.
//! 2. After a tracked step: expose the display flags to the step view.
//! 3. On `cart -> processing`: finalize (subscribe if needed) and attach the
//!    admin order field.
//!
//! Provider failures never fail a checkout step; they degrade to
//! "not subscribed" and are logged.
//!
//! [`OrderSubscriptionState`]: commerce_mailchimp_core::OrderSubscriptionState

mod finalizer;
mod lock;
mod orchestrator;

pub use finalizer::{FinalizePlan, OrderFieldDecision, OrderFieldFinalizer};
pub use lock::OrderLocks;
pub use orchestrator::CheckoutPipeline;

use commerce_mailchimp_core::{Address, AddressType, GroupSelections, ListId};
use serde::Deserialize;
use thiserror::Error;

use crate::config::MailchimpConfig;
use crate::store::StoreError;

/// Errors surfaced by the pipeline. Provider failures are absorbed and never
/// appear here.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Order store error: {0}")]
    Store(#[from] StoreError),
}

/// Pipeline settings taken from the Mailchimp configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub list_id: ListId,
    pub address_type: AddressType,
    pub double_opt_in: bool,
    pub groups: GroupSelections,
}

impl From<&MailchimpConfig> for PipelineSettings {
    fn from(config: &MailchimpConfig) -> Self {
        Self {
            list_id: config.list_id.clone(),
            address_type: config.address_type,
            double_opt_in: config.double_opt_in,
            groups: config.groups.clone(),
        }
    }
}

/// The addresses currently on the order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutAddresses {
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
}

impl CheckoutAddresses {
    /// The address of the configured type, if present.
    #[must_use]
    pub const fn resolve(&self, address_type: AddressType) -> Option<&Address> {
        match address_type {
            AddressType::Billing => self.billing_address.as_ref(),
            AddressType::Shipping => self.shipping_address.as_ref(),
        }
    }
}
