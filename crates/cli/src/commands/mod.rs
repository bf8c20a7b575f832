//! CLI subcommand implementations.

pub mod mailchimp;
pub mod migrate;
