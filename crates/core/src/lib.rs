//! Commerce Mailchimp Core - Shared checkout subscription types.
//!
//! This crate provides the value types used across the Mailchimp checkout
//! integration:
//! - `checkout` - Subscription pipeline, Mailchimp client, and HTTP surface
//! - `cli` - Command-line tools for migrations and provider lookups
//!
//! # Architecture
//!
//! The core crate contains only types and invariants - no I/O, no database
//! access, no HTTP clients. The subscription state machine's storage contract
//! (invariants on [`OrderSubscriptionState`]) lives here so every adapter
//! validates against the same rules.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, emails, addresses, statuses, and the order
//!   subscription state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
