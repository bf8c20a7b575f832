//! Mailchimp checkout CLI - Database migrations and operator lookups.
//!
//! # Usage
//!
//! ```bash
//! # Run checkout database migrations
//! mc-cli migrate
//!
//! # Show lists on the Mailchimp account
//! mc-cli lists
//!
//! # Show interest categories and groups of a list
//! mc-cli categories a1b2c3
//!
//! # Check an email against the configured list
//! mc-cli check shopper@example.com
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mc-cli")]
#[command(author, version, about = "Mailchimp checkout CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run checkout database migrations
    Migrate,
    /// List the audiences on the Mailchimp account
    Lists,
    /// Show interest categories and groups of a list
    Categories {
        /// List id (defaults to `MAILCHIMP_LIST_ID`)
        list_id: Option<String>,
    },
    /// Check whether an email is on the configured list
    Check {
        /// Email address to look up
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::checkout().await?,
        Commands::Lists => commands::mailchimp::lists().await?,
        Commands::Categories { list_id } => commands::mailchimp::categories(list_id).await?,
        Commands::Check { email } => commands::mailchimp::check(&email).await?,
    }
    Ok(())
}
