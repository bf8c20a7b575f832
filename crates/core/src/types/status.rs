//! Status enums for checkout steps, orders, and subscriptions.

use serde::{Deserialize, Serialize};

/// Mailing-list subscription status of an order's shopper.
///
/// Persisted on the order as the `mailchimp_status` property. `Unknown` is
/// stored as the empty string so orders that never reached the verification
/// stage read back as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Unknown,
    NotSubscribed,
    Subscribed,
}

impl SubscriptionStatus {
    /// Value written to the order property bag.
    #[must_use]
    pub const fn as_property_value(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::NotSubscribed => "not_subscribed",
            Self::Subscribed => "subscribed",
        }
    }

    /// Read a stored property value. Returns `None` for anything unrecognised.
    #[must_use]
    pub fn from_property_value(value: &str) -> Option<Self> {
        match value {
            "" => Some(Self::Unknown),
            "not_subscribed" => Some(Self::NotSubscribed),
            "subscribed" => Some(Self::Subscribed),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_subscribed(self) -> bool {
        matches!(self, Self::Subscribed)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::NotSubscribed => write!(f, "not_subscribed"),
            Self::Subscribed => write!(f, "subscribed"),
        }
    }
}

/// Which order address supplies the shopper's email and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    #[default]
    Billing,
    Shipping,
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Billing => write!(f, "billing"),
            Self::Shipping => write!(f, "shipping"),
        }
    }
}

impl std::str::FromStr for AddressType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "billing" => Ok(Self::Billing),
            "shipping" => Ok(Self::Shipping),
            _ => Err(format!(
                "invalid address type: {s} (expected billing or shipping)"
            )),
        }
    }
}

/// A step of the host checkout.
///
/// Only cart, address, and payment take part in the subscription pipeline;
/// every other step key is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    Cart,
    Address,
    Payment,
    Other(String),
}

impl CheckoutStep {
    /// Parse a step key as sent by the host checkout.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "cart" => Self::Cart,
            "address" => Self::Address,
            "payment" => Self::Payment,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Step key as used by the host checkout.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Cart => "cart",
            Self::Address => "address",
            Self::Payment => "payment",
            Self::Other(key) => key,
        }
    }

    /// Whether the subscription pipeline runs for this step.
    #[must_use]
    pub const fn tracks_subscription(&self) -> bool {
        matches!(self, Self::Cart | Self::Address | Self::Payment)
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Order lifecycle state in the host order system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Draft,
    Cart,
    Processing,
    Completed,
    Cancelled,
}

impl OrderState {
    /// The cart → processing transition is where the subscription is
    /// finalized.
    #[must_use]
    pub const fn is_finalization(from: Self, to: Self) -> bool {
        matches!((from, to), (Self::Cart, Self::Processing))
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Cart => write!(f, "cart"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
