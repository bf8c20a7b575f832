//! Checkout service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Service
//! - `CHECKOUT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `CHECKOUT_HOST` - Bind address (default: 127.0.0.1)
//! - `CHECKOUT_PORT` - Listen port (default: 3002)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//!
//! ## Mailchimp
//! - `MAILCHIMP_API_KEY` - API key, `<secret>-<region>` (required)
//! - `MAILCHIMP_LIST_ID` - Audience list new subscribers are added to (required)
//! - `MAILCHIMP_ADDRESS_TYPE` - `billing` or `shipping` (required)
//! - `MAILCHIMP_DOUBLE_OPT_IN` - Send a confirmation email before subscribing (default: false)
//! - `MAILCHIMP_GROUPS` - Comma separated `category:group` pairs to assign
//! - `MAILCHIMP_API_HOST` - Provider host the region prefix is joined to (default: mailchimp.com)
//! - `MAILCHIMP_API_BASE_URL` - Full API base URL override (mock servers)
//!
//! The Mailchimp block is loaded separately from the service block: an
//! incomplete Mailchimp setup leaves the integration inactive instead of
//! stopping the service.

use std::net::{IpAddr, SocketAddr};

use commerce_mailchimp_core::{AddressType, GroupSelections, ListId};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::mailchimp::Region;

/// Default provider host.
pub const DEFAULT_API_HOST: &str = "mailchimp.com";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Invalid Mailchimp API key: {0}")]
    InvalidApiKey(String),
}

/// Checkout service configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Mailchimp integration configuration.
///
/// Immutable for the lifetime of the process. Implements `Debug` manually to
/// redact the API key.
#[derive(Clone)]
pub struct MailchimpConfig {
    /// Mailchimp API key (`<secret>-<region>`)
    pub api_key: SecretString,
    /// Region code taken from the API key
    pub region: Region,
    /// Audience list new subscribers are added to
    pub list_id: ListId,
    /// Which order address supplies email and names
    pub address_type: AddressType,
    /// Subscribe as `pending` so the provider sends a confirmation email
    pub double_opt_in: bool,
    /// Interest groups new subscribers are added to
    pub groups: GroupSelections,
    /// Provider host (e.g. mailchimp.com)
    pub api_host: String,
    /// Full API base URL override
    pub api_base_url: Option<String>,
}

impl std::fmt::Debug for MailchimpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailchimpConfig")
            .field("api_key", &"[REDACTED]")
            .field("region", &self.region)
            .field("list_id", &self.list_id)
            .field("address_type", &self.address_type)
            .field("double_opt_in", &self.double_opt_in)
            .field("groups", &self.groups)
            .field("api_host", &self.api_host)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CHECKOUT_DATABASE_URL")?;
        let host = get_env_or_default("CHECKOUT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("CHECKOUT_PORT", "3002")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_PORT".to_string(), e.to_string()))?;

        Ok(Self {
            database_url,
            host,
            port,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_rate("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_rate("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MailchimpConfig {
    /// Load the Mailchimp block from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the API key, list id, or address type is
    /// missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the Mailchimp block through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`MailchimpConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let api_key = SecretString::from(required("MAILCHIMP_API_KEY")?);
        let region = Region::from_api_key(api_key.expose_secret())?;
        let list_id = ListId::new(required("MAILCHIMP_LIST_ID")?);
        let address_type = required("MAILCHIMP_ADDRESS_TYPE")?
            .parse::<AddressType>()
            .map_err(|e| ConfigError::InvalidEnvVar("MAILCHIMP_ADDRESS_TYPE".to_string(), e))?;
        let double_opt_in = parse_bool(
            "MAILCHIMP_DOUBLE_OPT_IN",
            lookup("MAILCHIMP_DOUBLE_OPT_IN").as_deref(),
        )?;
        let groups = lookup("MAILCHIMP_GROUPS")
            .map(|v| GroupSelections::parse(&v))
            .unwrap_or_default();
        let api_host = lookup("MAILCHIMP_API_HOST")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());
        let api_base_url = lookup("MAILCHIMP_API_BASE_URL")
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .map(|v| {
                url::Url::parse(&v)
                    .map(|_| v)
                    .map_err(|e| {
                        ConfigError::InvalidEnvVar("MAILCHIMP_API_BASE_URL".to_string(), e.to_string())
                    })
            })
            .transpose()?;

        Ok(Self {
            api_key,
            region,
            list_id,
            address_type,
            double_opt_in,
            groups,
            api_host,
            api_base_url,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a sample rate in `0.0..=1.0`.
fn get_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let Some(raw) = get_optional_env(key) else {
        return Ok(default);
    };
    let rate = raw
        .parse::<f32>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("must be between 0.0 and 1.0 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Parse a checkbox-style boolean. Absent or blank means `false`.
fn parse_bool(key: &str, value: Option<&str>) -> Result<bool, ConfigError> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("" | "0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("expected a boolean (got {other})"),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    const COMPLETE: &[(&str, &str)] = &[
        ("MAILCHIMP_API_KEY", "0123456789abcdef-us6"),
        ("MAILCHIMP_LIST_ID", "a1b2c3"),
        ("MAILCHIMP_ADDRESS_TYPE", "shipping"),
    ];

    #[test]
    fn test_complete_config() {
        let config = MailchimpConfig::from_lookup(lookup(COMPLETE)).expect("valid config");
        assert_eq!(config.region.as_str(), "us6");
        assert_eq!(config.list_id.as_str(), "a1b2c3");
        assert_eq!(config.address_type, AddressType::Shipping);
        assert!(!config.double_opt_in);
        assert!(config.groups.is_empty());
        assert_eq!(config.api_host, DEFAULT_API_HOST);
        assert_eq!(config.api_base_url, None);
    }

    #[test]
    fn test_missing_list_id() {
        let vars = [
            ("MAILCHIMP_API_KEY", "0123456789abcdef-us6"),
            ("MAILCHIMP_LIST_ID", "  "),
            ("MAILCHIMP_ADDRESS_TYPE", "billing"),
        ];
        let err = MailchimpConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "MAILCHIMP_LIST_ID"));
    }

    #[test]
    fn test_api_key_without_region() {
        let vars = [
            ("MAILCHIMP_API_KEY", "0123456789abcdef"),
            ("MAILCHIMP_LIST_ID", "a1b2c3"),
            ("MAILCHIMP_ADDRESS_TYPE", "billing"),
        ];
        let err = MailchimpConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidApiKey(_)));
    }

    #[test]
    fn test_invalid_address_type() {
        let vars = [
            ("MAILCHIMP_API_KEY", "0123456789abcdef-us6"),
            ("MAILCHIMP_LIST_ID", "a1b2c3"),
            ("MAILCHIMP_ADDRESS_TYPE", "home"),
        ];
        let err = MailchimpConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "MAILCHIMP_ADDRESS_TYPE"));
    }

    #[test]
    fn test_optional_settings() {
        let mut vars = COMPLETE.to_vec();
        vars.push(("MAILCHIMP_DOUBLE_OPT_IN", "on"));
        vars.push(("MAILCHIMP_GROUPS", "cat:g1,cat:g2"));
        vars.push(("MAILCHIMP_API_BASE_URL", "http://127.0.0.1:9000/3.0/"));
        let config = MailchimpConfig::from_lookup(lookup(&vars)).expect("valid config");
        assert!(config.double_opt_in);
        assert_eq!(config.groups.group_ids().count(), 2);
        assert_eq!(
            config.api_base_url.as_deref(),
            Some("http://127.0.0.1:9000/3.0/")
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let mut vars = COMPLETE.to_vec();
        vars.push(("MAILCHIMP_API_BASE_URL", "not a url"));
        let err = MailchimpConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "MAILCHIMP_API_BASE_URL"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(!parse_bool("K", None).unwrap());
        assert!(!parse_bool("K", Some("")).unwrap());
        assert!(parse_bool("K", Some("TRUE")).unwrap());
        assert!(parse_bool("K", Some("maybe")).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = MailchimpConfig::from_lookup(lookup(COMPLETE)).expect("valid config");
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("0123456789abcdef"));
    }
}
