//! Unified error handling with Sentry integration.
//!
//! Handlers return `Result<T, AppError>`; server-side failures are captured to
//! Sentry before the response is written.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::mailchimp::MailchimpError;
use crate::pipeline::CheckoutError;
use crate::store::StoreError;

/// Application-level error type for the checkout service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Pipeline failed (order store).
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Mailchimp admin lookup failed.
    #[error("Mailchimp error: {0}")]
    Mailchimp(#[from] MailchimpError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Checkout(err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Every variant is a server-side failure
        let event_id = sentry::capture_error(&self);
        tracing::error!(
            error = %self,
            sentry_event_id = %event_id,
            "Request error"
        );

        // Don't expose internal error details to clients
        let (status, message) = match &self {
            Self::Checkout(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            Self::Mailchimp(_) => (StatusCode::BAD_GATEWAY, "External service error"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a checkout event.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of events
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        data: data
            .iter()
            .map(|(k, v)| ((*k).to_string(), sentry::protocol::Value::String((*v).to_string())))
            .collect(),
        ..Default::default()
    };
    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Mailchimp(MailchimpError::Parse("bad".to_string()))
                .into_response()
                .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(StoreError::Corrupt {
                key: "mailchimp_status".to_string(),
                value: "\"pending\"".to_string(),
            })
            .into_response()
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
