//! Subscription finalization on `cart -> processing`.

use std::sync::Arc;

use commerce_mailchimp_core::{OrderId, OrderSubscriptionState, SubscriberId};
use tracing::{debug, error, info, instrument, warn};

use super::{CheckoutAddresses, CheckoutError, OrderLocks, PipelineSettings};
use crate::mailchimp::SubscriptionProvider;
use crate::store::SubscriptionStateStore;

/// What the finalizer should do for a given state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizePlan {
    /// Already on the list; link to the existing subscriber.
    Existing(SubscriberId),
    /// Opted in but not on the list yet.
    Subscribe,
    /// Nothing to do.
    NotSubscribed,
}

impl FinalizePlan {
    /// Decide from the stored state alone.
    #[must_use]
    pub fn for_state(state: &OrderSubscriptionState) -> Self {
        match (&state.subscriber_id, state.status.is_subscribed()) {
            (Some(id), true) => Self::Existing(id.clone()),
            _ if state.opt_in => Self::Subscribe,
            _ => Self::NotSubscribed,
        }
    }
}

/// Outcome shown on the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderFieldDecision {
    Subscribed {
        subscriber_id: SubscriberId,
        console_url: String,
    },
    NotSubscribed,
}

/// Subscribes opted-in customers when an order is placed.
#[derive(Clone)]
pub struct OrderFieldFinalizer {
    provider: Arc<dyn SubscriptionProvider>,
    store: SubscriptionStateStore,
    settings: PipelineSettings,
    locks: OrderLocks,
}

impl OrderFieldFinalizer {
    #[must_use]
    pub fn new(
        provider: Arc<dyn SubscriptionProvider>,
        store: SubscriptionStateStore,
        settings: PipelineSettings,
    ) -> Self {
        Self::with_locks(provider, store, settings, OrderLocks::new())
    }

    /// Share `locks` with other stages that write the same orders.
    #[must_use]
    pub fn with_locks(
        provider: Arc<dyn SubscriptionProvider>,
        store: SubscriptionStateStore,
        settings: PipelineSettings,
        locks: OrderLocks,
    ) -> Self {
        Self {
            provider,
            store,
            settings,
            locks,
        }
    }

    /// Run finalization for `order_id`.
    ///
    /// Holds the order's lock for the whole read-subscribe-persist sequence and
    /// records the order as finalized before releasing it, whatever the
    /// outcome. A repeated transition gets the recorded outcome back without
    /// calling the provider, so a failed subscribe is never retried.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Store` if the state cannot be read. Provider
    /// failures yield `OrderFieldDecision::NotSubscribed`.
    #[instrument(skip(self, addresses), fields(order_id = %order_id))]
    pub async fn finalize(
        &self,
        order_id: OrderId,
        addresses: &CheckoutAddresses,
    ) -> Result<OrderFieldDecision, CheckoutError> {
        let _guard = self.locks.acquire(order_id).await;
        let state = self.store.get(order_id).await?;

        if state.finalized {
            debug!("Order already finalized, reusing the recorded outcome");
            return Ok(self.decision(state.subscriber_id));
        }

        let (next, subscriber_id) = match FinalizePlan::for_state(&state) {
            FinalizePlan::NotSubscribed => (state, None),
            FinalizePlan::Existing(id) => (state, Some(id)),
            FinalizePlan::Subscribe => self.subscribe(state, addresses).await,
        };

        if let Err(e) = self.store.set(order_id, &next.mark_finalized()).await {
            // The outcome is still reported on the order.
            error!(error = %e, "Failed to record order finalization");
        }

        Ok(self.decision(subscriber_id))
    }

    fn decision(&self, subscriber_id: Option<SubscriberId>) -> OrderFieldDecision {
        subscriber_id.map_or(OrderFieldDecision::NotSubscribed, |subscriber_id| {
            OrderFieldDecision::Subscribed {
                console_url: self.provider.subscriber_url(&subscriber_id),
                subscriber_id,
            }
        })
    }

    /// Subscribe the configured address. Returns the state to persist and the
    /// new subscriber id, if any.
    async fn subscribe(
        &self,
        state: OrderSubscriptionState,
        addresses: &CheckoutAddresses,
    ) -> (OrderSubscriptionState, Option<SubscriberId>) {
        let Some(address) = addresses.resolve(self.settings.address_type) else {
            warn!(
                address_type = %self.settings.address_type,
                "Customer opted in but the order has no such address"
            );
            return (state, None);
        };

        let subscriber_id = match self
            .provider
            .subscribe(
                &self.settings.list_id,
                address,
                self.settings.double_opt_in,
                &self.settings.groups,
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to subscribe customer");
                return (state, None);
            }
        };

        info!(subscriber_id = %subscriber_id, "Subscribed customer to mailing list");

        let email = address.raw_email().map(str::to_owned);
        (
            state.subscribed(email, subscriber_id.clone()),
            Some(subscriber_id),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use commerce_mailchimp_core::{AddressType, GroupSelections, ListId, SubscriptionStatus};

    use super::*;
    use crate::pipeline::testing::{FakeProvider, address};
    use crate::store::MemoryOrderStore;

    const ORDER: OrderId = OrderId::new(7);

    fn settings() -> PipelineSettings {
        PipelineSettings {
            list_id: ListId::new("abc"),
            address_type: AddressType::Billing,
            double_opt_in: false,
            groups: GroupSelections::default(),
        }
    }

    fn finalizer(provider: Arc<FakeProvider>) -> (OrderFieldFinalizer, SubscriptionStateStore) {
        let store = SubscriptionStateStore::new(Arc::new(MemoryOrderStore::new()));
        (
            OrderFieldFinalizer::new(provider, store.clone(), settings()),
            store,
        )
    }

    fn billing(email: &str) -> CheckoutAddresses {
        CheckoutAddresses {
            billing_address: Some(address(email)),
            shipping_address: None,
        }
    }

    #[test]
    fn test_plan_table() {
        let none = OrderSubscriptionState::default();
        assert_eq!(FinalizePlan::for_state(&none), FinalizePlan::NotSubscribed);

        let opted = OrderSubscriptionState::default().opted_in();
        assert_eq!(FinalizePlan::for_state(&opted), FinalizePlan::Subscribe);

        let opted_not = opted.clone().not_subscribed(Some("a@x.com".to_owned()));
        assert_eq!(FinalizePlan::for_state(&opted_not), FinalizePlan::Subscribe);

        let existing = OrderSubscriptionState::default()
            .subscribed(Some("a@x.com".to_owned()), SubscriberId::new("9"));
        assert_eq!(
            FinalizePlan::for_state(&existing),
            FinalizePlan::Existing(SubscriberId::new("9"))
        );
        assert_eq!(
            FinalizePlan::for_state(&existing.opted_in()),
            FinalizePlan::Existing(SubscriberId::new("9"))
        );
    }

    #[tokio::test]
    async fn test_not_opted_in_never_calls_provider() {
        let provider = Arc::new(FakeProvider::default());
        let (finalizer, _) = finalizer(provider.clone());

        let decision = finalizer.finalize(ORDER, &billing("a@x.com")).await.unwrap();
        assert_eq!(decision, OrderFieldDecision::NotSubscribed);
        assert_eq!(provider.subscribes(), 0);
    }

    #[tokio::test]
    async fn test_opted_in_subscribes_and_persists() {
        let provider = Arc::new(FakeProvider::default());
        let (finalizer, store) = finalizer(provider.clone());
        store
            .set(ORDER, &OrderSubscriptionState::default().opted_in())
            .await
            .unwrap();

        let decision = finalizer.finalize(ORDER, &billing("a@x.com")).await.unwrap();
        assert!(matches!(
            decision,
            OrderFieldDecision::Subscribed { ref subscriber_id, .. } if subscriber_id.as_str() == "1001"
        ));
        assert_eq!(provider.subscribes(), 1);

        let state = store.get(ORDER).await.unwrap();
        assert_eq!(state.status, SubscriptionStatus::Subscribed);
        assert_eq!(state.subscriber_id, Some(SubscriberId::new("1001")));
        assert_eq!(state.email.as_deref(), Some("a@x.com"));
    }

    #[tokio::test]
    async fn test_existing_subscription_links_without_subscribing() {
        let provider = Arc::new(FakeProvider::default());
        let (finalizer, store) = finalizer(provider.clone());
        store
            .set(
                ORDER,
                &OrderSubscriptionState::default()
                    .subscribed(Some("a@x.com".to_owned()), SubscriberId::new("55")),
            )
            .await
            .unwrap();

        let decision = finalizer.finalize(ORDER, &billing("a@x.com")).await.unwrap();
        assert_eq!(
            decision,
            OrderFieldDecision::Subscribed {
                subscriber_id: SubscriberId::new("55"),
                console_url: "https://us6.admin.mailchimp.com/lists/members/view?id=55"
                    .to_string(),
            }
        );
        assert_eq!(provider.subscribes(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_not_subscribed() {
        let provider = Arc::new(FakeProvider {
            fail_subscribe: true,
            ..FakeProvider::default()
        });
        let (finalizer, store) = finalizer(provider.clone());
        store
            .set(ORDER, &OrderSubscriptionState::default().opted_in())
            .await
            .unwrap();

        let decision = finalizer.finalize(ORDER, &billing("a@x.com")).await.unwrap();
        assert_eq!(decision, OrderFieldDecision::NotSubscribed);

        let state = store.get(ORDER).await.unwrap();
        assert_eq!(state.subscriber_id, None);
        assert!(state.finalized);
    }

    #[tokio::test]
    async fn test_failed_subscribe_is_not_retried() {
        let provider = Arc::new(FakeProvider {
            fail_subscribe: true,
            ..FakeProvider::default()
        });
        let (finalizer, store) = finalizer(provider.clone());
        store
            .set(ORDER, &OrderSubscriptionState::default().opted_in())
            .await
            .unwrap();

        let addresses = billing("a@x.com");
        let first = finalizer.finalize(ORDER, &addresses).await.unwrap();
        let again = finalizer.finalize(ORDER, &addresses).await.unwrap();

        assert_eq!(first, OrderFieldDecision::NotSubscribed);
        assert_eq!(again, OrderFieldDecision::NotSubscribed);
        assert_eq!(provider.subscribes(), 1);
    }

    #[tokio::test]
    async fn test_repeat_finalize_returns_recorded_subscription() {
        let provider = Arc::new(FakeProvider::default());
        let (finalizer, store) = finalizer(provider.clone());
        store
            .set(ORDER, &OrderSubscriptionState::default().opted_in())
            .await
            .unwrap();

        let addresses = billing("a@x.com");
        let first = finalizer.finalize(ORDER, &addresses).await.unwrap();
        let again = finalizer.finalize(ORDER, &addresses).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(provider.subscribes(), 1);
        assert!(store.get(ORDER).await.unwrap().finalized);
    }

    #[tokio::test]
    async fn test_not_opted_in_is_recorded_as_final() {
        let provider = Arc::new(FakeProvider::default());
        let (finalizer, store) = finalizer(provider.clone());

        finalizer.finalize(ORDER, &billing("a@x.com")).await.unwrap();
        // opting in after the order was placed changes nothing
        store
            .set(ORDER, &store.get(ORDER).await.unwrap().opted_in())
            .await
            .unwrap();

        let again = finalizer.finalize(ORDER, &billing("a@x.com")).await.unwrap();
        assert_eq!(again, OrderFieldDecision::NotSubscribed);
        assert_eq!(provider.subscribes(), 0);
    }

    #[tokio::test]
    async fn test_missing_address_skips_subscribe() {
        let provider = Arc::new(FakeProvider::default());
        let (finalizer, store) = finalizer(provider.clone());
        store
            .set(ORDER, &OrderSubscriptionState::default().opted_in())
            .await
            .unwrap();

        let decision = finalizer
            .finalize(ORDER, &CheckoutAddresses::default())
            .await
            .unwrap();
        assert_eq!(decision, OrderFieldDecision::NotSubscribed);
        assert_eq!(provider.subscribes(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_finalize_subscribes_once() {
        let provider = Arc::new(FakeProvider::default());
        let (finalizer, store) = finalizer(provider.clone());
        store
            .set(ORDER, &OrderSubscriptionState::default().opted_in())
            .await
            .unwrap();

        let addresses = billing("a@x.com");
        let (first, second) = tokio::join!(
            finalizer.finalize(ORDER, &addresses),
            finalizer.finalize(ORDER, &addresses)
        );

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(provider.subscribes(), 1);
    }
}
