//! Mailchimp newsletter subscription for a multi-step checkout.
//!
//! The host checkout controller calls this service around each checkout step
//! and on every order state transition. Shoppers tick an opt-in checkbox; the
//! service verifies whether the order's email is already on the configured
//! list, and when the order is placed subscribes opted-in shoppers and attaches
//! a status field (with a link to the Mailchimp console) to the order.
//!
//! This crate provides the service as a library, allowing it to be tested and
//! reused; `main.rs` only wires configuration, telemetry, and the listener.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod fields;
pub mod mailchimp;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod store;
