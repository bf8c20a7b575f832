//! Per-order subscription state carried across checkout requests.

use serde::{Deserialize, Serialize};

use super::id::SubscriberId;
use super::status::SubscriptionStatus;

/// Invariant violations detected when writing subscription state.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A subscriber id was set on a state that is not subscribed.
    #[error("subscriber id present while status is {0}")]
    UnexpectedSubscriberId(SubscriptionStatus),

    /// The state claims a subscription without a subscriber id.
    #[error("status is subscribed but no subscriber id is set")]
    MissingSubscriberId,

    /// A previously raised opt-in would be cleared.
    #[error("opt-in cannot be withdrawn once given")]
    OptInWithdrawn,

    /// A finalized order would be reopened.
    #[error("order subscription was already finalized")]
    FinalizationReverted,
}

/// Mailing-list subscription state of one order.
///
/// ## Invariants
///
/// - `subscriber_id` is present iff `status` is `Subscribed`.
/// - `Subscribed` only holds for the `email` it was verified against; see
///   [`OrderSubscriptionState::is_verified_for`].
/// - `opt_in` never goes from `true` back to `false` for the same order.
/// - `finalized` is set once, when the order is placed, and never cleared.
///   The subscribe call is only made by the transition that sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubscriptionState {
    pub opt_in: bool,
    pub email: Option<String>,
    pub status: SubscriptionStatus,
    pub subscriber_id: Option<SubscriberId>,
    #[serde(default)]
    pub finalized: bool,
}

impl OrderSubscriptionState {
    /// Check the subscriber-id/status invariant.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` describing the mismatch.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let has_id = self.subscriber_id.as_ref().is_some_and(|id| !id.is_empty());
        match (self.status, has_id) {
            (SubscriptionStatus::Subscribed, false) => Err(ValidationError::MissingSubscriberId),
            (status, true) if !status.is_subscribed() => {
                Err(ValidationError::UnexpectedSubscriberId(status))
            }
            _ => Ok(()),
        }
    }

    /// Check that `self` is a legal successor of `previous`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OptInWithdrawn` if the opt-in would be lowered,
    /// `ValidationError::FinalizationReverted` if a finalized order would be
    /// reopened, or any error from [`Self::validate`].
    pub fn validate_transition(&self, previous: &Self) -> Result<(), ValidationError> {
        if previous.opt_in && !self.opt_in {
            return Err(ValidationError::OptInWithdrawn);
        }
        if previous.finalized && !self.finalized {
            return Err(ValidationError::FinalizationReverted);
        }
        self.validate()
    }

    /// Whether a stored subscription can be trusted for `email` without asking
    /// the provider again.
    #[must_use]
    pub fn is_verified_for(&self, email: Option<&str>) -> bool {
        self.status.is_subscribed() && self.email.as_deref() == email
    }

    /// Record a confirmed list membership for `email`.
    #[must_use]
    pub fn subscribed(self, email: Option<String>, subscriber_id: SubscriberId) -> Self {
        Self {
            email,
            status: SubscriptionStatus::Subscribed,
            subscriber_id: Some(subscriber_id),
            ..self
        }
    }

    /// Record that `email` is not (or could not be confirmed to be) on the list.
    #[must_use]
    pub fn not_subscribed(self, email: Option<String>) -> Self {
        Self {
            email,
            status: SubscriptionStatus::NotSubscribed,
            subscriber_id: None,
            ..self
        }
    }

    /// Forget any verification: there is no address to check against yet.
    #[must_use]
    pub fn unverified(self, email: Option<String>) -> Self {
        Self {
            email,
            status: SubscriptionStatus::Unknown,
            subscriber_id: None,
            ..self
        }
    }

    /// Raise the opt-in flag.
    #[must_use]
    pub fn opted_in(self) -> Self {
        Self {
            opt_in: true,
            ..self
        }
    }

    /// Mark the order as placed; no further subscribe attempt is made.
    #[must_use]
    pub fn mark_finalized(self) -> Self {
        Self {
            finalized: true,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown_and_valid() {
        let state = OrderSubscriptionState::default();
        assert_eq!(state.status, SubscriptionStatus::Unknown);
        assert!(!state.opt_in);
        assert_eq!(state.validate(), Ok(()));
    }

    #[test]
    fn test_subscribed_requires_id() {
        let state = OrderSubscriptionState {
            status: SubscriptionStatus::Subscribed,
            ..Default::default()
        };
        assert_eq!(state.validate(), Err(ValidationError::MissingSubscriberId));

        let state = OrderSubscriptionState {
            status: SubscriptionStatus::Subscribed,
            subscriber_id: Some(SubscriberId::new("")),
            ..Default::default()
        };
        assert_eq!(state.validate(), Err(ValidationError::MissingSubscriberId));
    }

    #[test]
    fn test_id_requires_subscribed() {
        let state = OrderSubscriptionState {
            status: SubscriptionStatus::NotSubscribed,
            subscriber_id: Some(SubscriberId::new("42")),
            ..Default::default()
        };
        assert_eq!(
            state.validate(),
            Err(ValidationError::UnexpectedSubscriberId(
                SubscriptionStatus::NotSubscribed
            ))
        );
    }

    #[test]
    fn test_opt_in_cannot_be_withdrawn() {
        let previous = OrderSubscriptionState::default().opted_in();
        let next = OrderSubscriptionState::default();
        assert_eq!(
            next.validate_transition(&previous),
            Err(ValidationError::OptInWithdrawn)
        );
        assert_eq!(previous.validate_transition(&next), Ok(()));
    }

    #[test]
    fn test_finalization_cannot_be_reverted() {
        let previous = OrderSubscriptionState::default().opted_in().mark_finalized();
        let reopened = OrderSubscriptionState::default().opted_in();
        assert_eq!(
            reopened.validate_transition(&previous),
            Err(ValidationError::FinalizationReverted)
        );

        let later = previous
            .clone()
            .subscribed(Some("a@x.com".to_owned()), SubscriberId::new("7"));
        assert_eq!(later.validate_transition(&previous), Ok(()));
        assert!(later.finalized);
    }

    #[test]
    fn test_transitions_keep_opt_in() {
        let state = OrderSubscriptionState::default()
            .opted_in()
            .subscribed(Some("a@x.com".to_owned()), SubscriberId::new("7"))
            .not_subscribed(Some("b@x.com".to_owned()));
        assert!(state.opt_in);
        assert_eq!(state.status, SubscriptionStatus::NotSubscribed);
        assert_eq!(state.subscriber_id, None);
        assert_eq!(state.validate(), Ok(()));
    }

    #[test]
    fn test_is_verified_for() {
        let state = OrderSubscriptionState::default()
            .subscribed(Some("a@x.com".to_owned()), SubscriberId::new("7"));
        assert!(state.is_verified_for(Some("a@x.com")));
        assert!(!state.is_verified_for(Some("b@x.com")));
        assert!(!state.is_verified_for(None));
        assert!(!OrderSubscriptionState::default().is_verified_for(None));
    }

    #[test]
    fn test_unverified_clears_status() {
        let state = OrderSubscriptionState::default()
            .opted_in()
            .subscribed(Some("a@x.com".to_owned()), SubscriberId::new("7"))
            .unverified(None);
        assert!(state.opt_in);
        assert_eq!(state.status, SubscriptionStatus::Unknown);
        assert_eq!(state.subscriber_id, None);
        assert_eq!(state.validate(), Ok(()));
    }
}
