//! Order address as provided by the host order system.

use serde::{Deserialize, Serialize};

use super::email::{Email, EmailError};

/// A billing or shipping address on an order.
///
/// Read-only to the subscription pipeline; only the email and name fields are
/// consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
}

/// First and last name submitted as list merge fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactName {
    pub first: String,
    pub last: String,
}

impl ContactName {
    /// Mailchimp rejects an empty `LNAME`, so a missing last name is sent as a
    /// single space.
    pub const EMPTY_LAST_NAME: &'static str = " ";
}

impl Address {
    /// Raw email as entered, trimmed; `None` when blank or absent.
    #[must_use]
    pub fn raw_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Parse the address email.
    ///
    /// # Errors
    ///
    /// Returns `EmailError::Empty` when the address has no email, or the parse
    /// error for a malformed one.
    pub fn parsed_email(&self) -> Result<Email, EmailError> {
        Email::parse(self.email.as_deref().unwrap_or_default())
    }

    /// Resolve merge-field names.
    ///
    /// Explicit first/last names win. When both are blank the full name is
    /// split on its last whitespace (a single token becomes the first name).
    #[must_use]
    pub fn contact_name(&self) -> ContactName {
        let first = non_blank(self.firstname.as_deref());
        let last = non_blank(self.lastname.as_deref());

        let (first, last) = match (first, last, non_blank(self.fullname.as_deref())) {
            (None, None, Some(full)) => match full.rsplit_once(char::is_whitespace) {
                Some((first, last)) => (first.trim().to_owned(), last.trim().to_owned()),
                None => (full.to_owned(), String::new()),
            },
            (first, last, _) => (
                first.unwrap_or_default().to_owned(),
                last.unwrap_or_default().to_owned(),
            ),
        };

        ContactName {
            first,
            last: if last.is_empty() {
                ContactName::EMPTY_LAST_NAME.to_owned()
            } else {
                last
            },
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
