//! Operator lookups against the configured Mailchimp account.
//!
//! # Usage
//!
//! ```bash
//! # Lists on the account
//! mc-cli lists
//!
//! # Interest categories and groups of a list (configured list by default)
//! mc-cli categories [LIST_ID]
//!
//! # Is this email on the configured list?
//! mc-cli check shopper@example.com
//! ```
//!
//! Reads the same `MAILCHIMP_*` variables as the checkout service.

#![allow(clippy::print_stdout)]

use commerce_mailchimp_checkout::config::{ConfigError, MailchimpConfig};
use commerce_mailchimp_checkout::mailchimp::{
    MailchimpClient, MailchimpError, Membership, MetadataCache, SubscriptionProvider, member_hash,
};
use commerce_mailchimp_core::{Email, EmailError, ListId};
use thiserror::Error;

/// Errors from lookup commands.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mailchimp error: {0}")]
    Mailchimp(#[from] MailchimpError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

fn connect() -> Result<(MailchimpConfig, MailchimpClient), LookupError> {
    let config = MailchimpConfig::from_env()?;
    let client = MailchimpClient::new(&config)?;
    tracing::info!(region = %config.region, "Using Mailchimp API at {}", client.base_url());
    Ok((config, client))
}

/// Print the lists on the account, marking the configured one.
///
/// # Errors
///
/// Returns `LookupError` if configuration is missing or the API call fails.
pub async fn lists() -> Result<(), LookupError> {
    let (config, client) = connect()?;

    for list in client.get_lists().await? {
        let marker = if list.id == config.list_id.as_str() { "*" } else { " " };
        println!("{marker} {}\t{}", list.id, list.label);
    }
    Ok(())
}

/// Print the interest categories of a list with their groups.
///
/// # Errors
///
/// Returns `LookupError` if configuration is missing or an API call fails.
pub async fn categories(list_id: Option<String>) -> Result<(), LookupError> {
    let (config, client) = connect()?;
    let list_id = list_id.map_or_else(|| config.list_id.clone(), ListId::new);

    let tree = MetadataCache::new(client)
        .category_tree(&list_id, &config.groups)
        .await?;

    if tree.is_empty() {
        println!("List {list_id} has no interest categories");
    }
    for category in tree {
        println!("{}\t{}", category.id, category.label);
        for group in category.groups {
            let marker = if group.selected { "[x]" } else { "[ ]" };
            println!("  {marker} {}\t{}", group.id, group.label);
        }
    }
    Ok(())
}

/// Check whether `email` is on the configured list.
///
/// # Errors
///
/// Returns `LookupError` if the email is invalid, configuration is missing,
/// or the API call fails.
pub async fn check(email: &str) -> Result<(), LookupError> {
    let email = Email::parse(email)?;
    let (config, client) = connect()?;

    println!("member hash: {}", member_hash(&email));
    match client.check_subscription(&email, &config.list_id).await? {
        Membership::Subscribed(id) => {
            println!("subscribed (id {id})");
            println!("{}", client.subscriber_url(&id));
        }
        Membership::NotSubscribed => println!("not subscribed"),
    }
    Ok(())
}
