//! Core types for the Mailchimp checkout integration.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod email;
pub mod groups;
pub mod id;
pub mod state;
pub mod status;

pub use address::{Address, ContactName};
pub use email::{Email, EmailError};
pub use groups::GroupSelections;
pub use id::*;
pub use state::{OrderSubscriptionState, ValidationError};
pub use status::*;
