//! Mailchimp Marketing API client.
//!
//! # Architecture
//!
//! - Plain `reqwest` JSON calls with basic auth (`apikey`, `<api key>`)
//! - The API and the admin console are both region sharded: the region code
//!   is the part of the API key after the last hyphen
//! - Admin metadata (lists, interest categories, groups) is cached with `moka`
//!   for 60 seconds; checkout-time calls are never cached
//!
//! # Endpoints
//!
//! - `GET lists` - Lists on the account (admin only)
//! - `GET lists/{list}/members/{md5(lowercased email)}` - Membership check
//! - `POST lists/{list}/members/` - Subscribe
//! - `GET lists/{list}/interest-categories[/{category}/interests]` - Groups

mod cache;
pub(crate) mod client;
pub mod types;

pub use cache::{CategoryGroups, GroupOption, MetadataCache};
pub use client::{MailchimpClient, member_hash};
pub use types::{ListOption, MemberStatus, Membership, SubscribePayload};

use async_trait::async_trait;
use commerce_mailchimp_core::{Address, Email, EmailError, GroupSelections, ListId, SubscriberId};
use thiserror::Error;

use crate::config::ConfigError;

/// Mailchimp API version segment.
pub const API_VERSION: &str = "3.0";

/// Path of the member view page in the admin console.
const CONSOLE_MEMBER_PATH: &str = "lists/members/view";

/// Errors that can occur when interacting with the Mailchimp API.
#[derive(Debug, Error)]
pub enum MailchimpError {
    /// The API key does not carry a usable region code.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The contact has no usable email address.
    #[error("Invalid contact email: {0}")]
    InvalidEmail(#[from] EmailError),
}

impl MailchimpError {
    /// Whether this is a failed provider call (as opposed to bad local
    /// configuration).
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { .. } | Self::Parse(_))
    }
}

/// Region code of a Mailchimp account, e.g. `us6`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region(String);

impl Region {
    /// Take the region code from an API key of the form `<secret>-<region>`.
    ///
    /// The code is whatever follows the last hyphen.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidApiKey` if the key is empty, has no hyphen,
    /// or the suffix is not a usable host label.
    pub fn from_api_key(api_key: &str) -> Result<Self, ConfigError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ConfigError::InvalidApiKey("API key is empty".to_string()));
        }

        let Some((_, region)) = api_key.rsplit_once('-') else {
            return Err(ConfigError::InvalidApiKey(
                "API key has no region suffix (expected <key>-<region>)".to_string(),
            ));
        };

        if region.is_empty() || !region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidApiKey(format!(
                "invalid region suffix {region:?}"
            )));
        }

        Ok(Self(region.to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// API base URL, with trailing slash: `https://<region>.api.<host>/3.0/`.
    #[must_use]
    pub fn api_base_url(&self, host: &str) -> String {
        format!("https://{}.api.{host}/{API_VERSION}/", self.0)
    }

    /// Admin console page for a list member.
    #[must_use]
    pub fn console_member_url(&self, host: &str, subscriber_id: &SubscriberId) -> String {
        format!(
            "https://{}.admin.{host}/{CONSOLE_MEMBER_PATH}?id={}",
            self.0,
            urlencoding::encode(subscriber_id.as_str())
        )
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three provider operations the checkout pipeline depends on.
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    /// Look up whether `email` is a member of `list_id`.
    ///
    /// A provider "not found" is `Ok(Membership::NotSubscribed)`.
    ///
    /// # Errors
    ///
    /// Returns a transport error for any other failed call.
    async fn check_subscription(
        &self,
        email: &Email,
        list_id: &ListId,
    ) -> Result<Membership, MailchimpError>;

    /// Add the contact on `address` to `list_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address has no usable email or the call fails.
    async fn subscribe(
        &self,
        list_id: &ListId,
        address: &Address,
        double_opt_in: bool,
        groups: &GroupSelections,
    ) -> Result<SubscriberId, MailchimpError>;

    /// Admin console link for a subscriber.
    fn subscriber_url(&self, subscriber_id: &SubscriberId) -> String;
}
