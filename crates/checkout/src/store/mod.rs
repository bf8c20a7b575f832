//! Order-backed storage for the subscription state.
//!
//! The host order aggregate exposes a free-form property bag and a list of
//! display fields ([`OrderPropertyBag`]). [`SubscriptionStateStore`] is the
//! only code that touches the `mailchimp_*` properties: it turns them into
//! an [`OrderSubscriptionState`] on read and validates every write against the
//! state invariants.
//!
//! # Adapters
//!
//! - [`crate::db::PgOrderStore`] - `PostgreSQL` (`checkout.order_property`)
//! - [`MemoryOrderStore`] - In-process, for tests and local development

mod memory;

pub use memory::MemoryOrderStore;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use commerce_mailchimp_core::{
    OrderId, OrderSubscriptionState, SubscriberId, SubscriptionStatus, ValidationError,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, instrument};

use crate::fields::OrderField;

/// Property keys on the order aggregate.
pub mod keys {
    pub const OPT_IN: &str = "mailchimp_opt_in";
    pub const EMAIL: &str = "mailchimp_email";
    pub const STATUS: &str = "mailchimp_status";
    pub const SUBSCRIBER_ID: &str = "mailchimp_subscriber_id";
    pub const FINALIZED: &str = "mailchimp_finalized";

    pub const ALL: [&str; 5] = [OPT_IN, EMAIL, STATUS, SUBSCRIBER_ID, FINALIZED];
}

/// Errors from reading or writing order state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write would break a state invariant; nothing was written.
    #[error("Invalid subscription state: {0}")]
    Validation(#[from] ValidationError),

    /// The backing store failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored property could not be decoded.
    #[error("Corrupt order property {key}: {value}")]
    Corrupt { key: String, value: String },
}

/// The host order aggregate, as far as this integration uses it.
#[async_trait]
pub trait OrderPropertyBag: Send + Sync {
    /// Read the given properties. Absent keys are left out of the map.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing store fails.
    async fn properties(
        &self,
        order_id: OrderId,
        keys: &[&str],
    ) -> Result<HashMap<String, Value>, StoreError>;

    /// Write a batch of properties atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing store fails; no property is written.
    async fn set_properties(
        &self,
        order_id: OrderId,
        properties: Vec<(String, Value)>,
    ) -> Result<(), StoreError>;

    /// Attach a display field to the order, replacing one with the same name.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing store fails.
    async fn set_order_field(&self, order_id: OrderId, field: &OrderField)
    -> Result<(), StoreError>;

    /// Detach a display field. Removing an absent field is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing store fails.
    async fn remove_order_field(&self, order_id: OrderId, name: &str) -> Result<(), StoreError>;

    /// Display fields attached to the order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing store fails.
    async fn order_fields(&self, order_id: OrderId) -> Result<Vec<OrderField>, StoreError>;
}

/// Typed read/write access to an order's subscription state.
#[derive(Clone)]
pub struct SubscriptionStateStore {
    orders: Arc<dyn OrderPropertyBag>,
}

impl SubscriptionStateStore {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderPropertyBag>) -> Self {
        Self { orders }
    }

    /// The underlying order aggregate.
    #[must_use]
    pub fn orders(&self) -> &Arc<dyn OrderPropertyBag> {
        &self.orders
    }

    /// Current state of an order. Orders without any `mailchimp_*` property
    /// read as the default (unknown, not opted in).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if a stored value cannot be decoded.
    pub async fn get(&self, order_id: OrderId) -> Result<OrderSubscriptionState, StoreError> {
        let props = self.orders.properties(order_id, &keys::ALL).await?;
        decode(&props)
    }

    /// Persist `state`, writing only the properties that changed.
    ///
    /// Rejected writes leave the stored state untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if `state` breaks an invariant, would
    /// withdraw an opt-in or reopen a finalized order, or a backend error.
    #[instrument(skip(self, state), fields(order_id = %order_id, status = %state.status))]
    pub async fn set(
        &self,
        order_id: OrderId,
        state: &OrderSubscriptionState,
    ) -> Result<(), StoreError> {
        let previous = self.get(order_id).await?;

        if let Err(e) = state.validate_transition(&previous) {
            error!(error = %e, "Rejected invalid subscription state write");
            return Err(e.into());
        }

        let changed: Vec<(String, Value)> = encode(state)
            .into_iter()
            .zip(encode(&previous))
            .filter(|((_, next), (_, prev))| next != prev)
            .map(|((key, value), _)| (key.to_string(), value))
            .collect();

        if changed.is_empty() {
            return Ok(());
        }

        self.orders.set_properties(order_id, changed).await
    }
}

fn encode(state: &OrderSubscriptionState) -> [(&'static str, Value); 5] {
    [
        (keys::OPT_IN, Value::Bool(state.opt_in)),
        (
            keys::EMAIL,
            Value::String(state.email.clone().unwrap_or_default()),
        ),
        (
            keys::STATUS,
            Value::String(state.status.as_property_value().to_string()),
        ),
        (
            keys::SUBSCRIBER_ID,
            Value::String(
                state
                    .subscriber_id
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ),
        ),
        (keys::FINALIZED, Value::Bool(state.finalized)),
    ]
}

/// Flags were written as `"1"`/`"on"` strings by older checkouts.
fn decode_flag(props: &HashMap<String, Value>, key: &str) -> Result<bool, StoreError> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Number(n)) => Ok(n.as_i64().is_some_and(|n| n != 0)),
        Some(Value::String(s)) => Ok(matches!(s.as_str(), "1" | "true" | "on")),
        Some(other) => Err(StoreError::Corrupt {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

fn decode(props: &HashMap<String, Value>) -> Result<OrderSubscriptionState, StoreError> {
    let corrupt = |key: &str, value: &Value| StoreError::Corrupt {
        key: key.to_string(),
        value: value.to_string(),
    };

    let opt_in = decode_flag(props, keys::OPT_IN)?;

    let email = match props.get(keys::EMAIL) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => return Err(corrupt(keys::EMAIL, other)),
    };

    let status = match props.get(keys::STATUS) {
        None | Some(Value::Null) => SubscriptionStatus::Unknown,
        Some(Value::String(s)) => SubscriptionStatus::from_property_value(s)
            .ok_or_else(|| corrupt(keys::STATUS, &Value::String(s.clone())))?,
        Some(other) => return Err(corrupt(keys::STATUS, other)),
    };

    let subscriber_id = match props.get(keys::SUBSCRIBER_ID) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(SubscriberId::new(s.as_str())),
        Some(Value::Number(n)) => Some(SubscriberId::new(n.to_string())),
        Some(other) => return Err(corrupt(keys::SUBSCRIBER_ID, other)),
    };

    Ok(OrderSubscriptionState {
        opt_in,
        email,
        status,
        subscriber_id,
        finalized: decode_flag(props, keys::FINALIZED)?,
    })
}
