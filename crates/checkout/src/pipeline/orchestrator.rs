//! Checkout step hooks.

use std::collections::HashMap;
use std::sync::Arc;

use commerce_mailchimp_core::{Address, CheckoutStep, OrderId, OrderState, OrderSubscriptionState};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};

use super::{CheckoutAddresses, CheckoutError, OrderFieldFinalizer, OrderLocks, PipelineSettings};
use crate::fields::OrderField;
use crate::mailchimp::{Membership, SubscriptionProvider};
use crate::store::SubscriptionStateStore;

/// Form field carrying the opt-in checkbox.
pub const OPT_IN_FIELD: &str = "mailchimp_opt_in";

/// Checkbox value when ticked.
const OPT_IN_CHECKED: &str = "on";

/// Step-view flag: the integration is active.
pub const ENABLED_FLAG: &str = "mailchimp_enabled";

/// Step-view flag: the order's email is on the list.
pub const SUBSCRIBED_FLAG: &str = "mailchimp_subscribed";

/// Runs the subscription hooks for each checkout event.
#[derive(Clone)]
pub struct CheckoutPipeline {
    provider: Arc<dyn SubscriptionProvider>,
    store: SubscriptionStateStore,
    settings: PipelineSettings,
    finalizer: OrderFieldFinalizer,
    locks: OrderLocks,
}

impl CheckoutPipeline {
    #[must_use]
    pub fn new(
        provider: Arc<dyn SubscriptionProvider>,
        store: SubscriptionStateStore,
        settings: PipelineSettings,
    ) -> Self {
        let locks = OrderLocks::new();
        let finalizer = OrderFieldFinalizer::with_locks(
            Arc::clone(&provider),
            store.clone(),
            settings.clone(),
            locks.clone(),
        );
        Self {
            provider,
            store,
            settings,
            finalizer,
            locks,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &SubscriptionStateStore {
        &self.store
    }

    /// Before a step is shown: record the opt-in, then verify the
    /// subscription against the current address.
    ///
    /// Untracked steps are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Store` if the order state cannot be read or
    /// written.
    #[instrument(skip(self, form, addresses), fields(order_id = %order_id, step = %step))]
    pub async fn before_step(
        &self,
        order_id: OrderId,
        step: &CheckoutStep,
        form: &HashMap<String, String>,
        addresses: &CheckoutAddresses,
    ) -> Result<OrderSubscriptionState, CheckoutError> {
        if !step.tracks_subscription() {
            return Ok(self.store.get(order_id).await?);
        }

        // finalization must not land between the reads and writes below
        let _guard = self.locks.acquire(order_id).await;
        let current = self.store.get(order_id).await?;
        if current.finalized {
            debug!("Order already finalized, state left as recorded");
            return Ok(current);
        }

        self.raise_opt_in(order_id, form).await?;
        self.verify_subscription(order_id, addresses).await
    }

    /// After a step: expose the display flags to the step's view data.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Store` if the order state cannot be read.
    #[instrument(skip(self, data), fields(order_id = %order_id, step = %step))]
    pub async fn after_step(
        &self,
        order_id: OrderId,
        step: &CheckoutStep,
        data: &mut Map<String, Value>,
    ) -> Result<(), CheckoutError> {
        if !step.tracks_subscription() {
            return Ok(());
        }

        let state = self.store.get(order_id).await?;
        data.insert(ENABLED_FLAG.to_string(), Value::Bool(true));
        data.insert(
            SUBSCRIBED_FLAG.to_string(),
            Value::Bool(state.status.is_subscribed()),
        );
        Ok(())
    }

    /// On an order state transition: finalize on `cart -> processing` and
    /// attach the resulting field to the order.
    ///
    /// Returns the attached field, or `None` for any other transition.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Store` if the order cannot be read or the field
    /// cannot be attached.
    #[instrument(skip(self, addresses), fields(order_id = %order_id, from = %from, to = %to))]
    pub async fn order_transition(
        &self,
        order_id: OrderId,
        from: OrderState,
        to: OrderState,
        addresses: &CheckoutAddresses,
    ) -> Result<Option<OrderField>, CheckoutError> {
        if !OrderState::is_finalization(from, to) {
            return Ok(None);
        }

        let decision = self.finalizer.finalize(order_id, addresses).await?;
        let field = OrderField::from_decision(&decision);
        let orders = self.store.orders();
        orders.set_order_field(order_id, &field).await?;
        orders
            .remove_order_field(order_id, field.superseded_name())
            .await?;

        info!(field = %field.name, "Attached subscription field to order");
        Ok(Some(field))
    }

    /// Raise the opt-in flag if the checkbox was ticked. Never lowers it.
    async fn raise_opt_in(
        &self,
        order_id: OrderId,
        form: &HashMap<String, String>,
    ) -> Result<(), CheckoutError> {
        let checked = form
            .get(OPT_IN_FIELD)
            .is_some_and(|value| value == OPT_IN_CHECKED);
        if !checked {
            return Ok(());
        }

        let current = self.store.get(order_id).await?;
        if current.opt_in {
            return Ok(());
        }

        debug!("Customer opted in");
        self.store.set(order_id, &current.opted_in()).await?;
        Ok(())
    }

    /// Bring the stored status in line with the configured address.
    ///
    /// A stored subscription for the same email is trusted without asking the
    /// provider again; a changed email is always re-checked.
    async fn verify_subscription(
        &self,
        order_id: OrderId,
        addresses: &CheckoutAddresses,
    ) -> Result<OrderSubscriptionState, CheckoutError> {
        let current = self.store.get(order_id).await?;
        let address = addresses.resolve(self.settings.address_type);
        let email = address.and_then(Address::raw_email).map(str::to_owned);

        if current.is_verified_for(email.as_deref()) {
            debug!("Subscription already verified for this email");
            return Ok(current);
        }

        let next = match address.map(Address::parsed_email) {
            None => current.clone().unverified(email),
            Some(Err(e)) => {
                debug!(error = %e, "No usable email on the order address");
                current.clone().not_subscribed(email)
            }
            Some(Ok(parsed)) => {
                match self
                    .provider
                    .check_subscription(&parsed, &self.settings.list_id)
                    .await
                {
                    Ok(Membership::Subscribed(id)) => current.clone().subscribed(email, id),
                    Ok(Membership::NotSubscribed) => current.clone().not_subscribed(email),
                    Err(e) => {
                        error!(error = %e, "Subscription check failed, treating as not subscribed");
                        current.clone().not_subscribed(email)
                    }
                }
            }
        };

        if next != current {
            self.store.set(order_id, &next).await?;
        }
        Ok(next)
    }
}
