//! Admin-facing order field describing the subscription outcome.
//!
//! The finalizer only decides *what* to show ([`OrderFieldDecision`]); this
//! module turns that decision into the field attached to the order, with an
//! HTML rendering for the order view.

use askama::Template;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pipeline::OrderFieldDecision;

/// Field name when the customer is on the list.
pub const SUBSCRIBED_FIELD: &str = "mailchimp_field.subscribe";

/// Field name when the customer is not on the list.
pub const NOT_SUBSCRIBED_FIELD: &str = "mailchimp_field.not_subscribed";

/// Label shown next to the value in the order view.
pub const FIELD_LABEL: &str = "MailChimp status";

const SUBSCRIBED_VALUE: &str = "Subscribed";
const NOT_SUBSCRIBED_VALUE: &str = "Not Subscribed";
const CONSOLE_LINK_TITLE: &str =
    "Click here to view this customer's subscription details in MailChimp.";

#[derive(Template)]
#[template(path = "order_field/subscribed.html")]
struct SubscribedFieldHtml<'a> {
    label: &'a str,
    value: &'a str,
    url: &'a str,
    title: &'a str,
}

#[derive(Template)]
#[template(path = "order_field/not_subscribed.html")]
struct NotSubscribedFieldHtml<'a> {
    label: &'a str,
    value: &'a str,
}

/// A display field on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderField {
    pub name: String,
    pub label: String,
    pub value: String,
    /// HTML for the admin order view.
    pub rendered: String,
}

impl OrderField {
    /// Present a finalizer decision.
    #[must_use]
    pub fn from_decision(decision: &OrderFieldDecision) -> Self {
        match decision {
            OrderFieldDecision::Subscribed { console_url, .. } => {
                let html = SubscribedFieldHtml {
                    label: FIELD_LABEL,
                    value: SUBSCRIBED_VALUE,
                    url: console_url,
                    title: CONSOLE_LINK_TITLE,
                }
                .render();
                Self::new(SUBSCRIBED_FIELD, SUBSCRIBED_VALUE, html)
            }
            OrderFieldDecision::NotSubscribed => {
                let html = NotSubscribedFieldHtml {
                    label: FIELD_LABEL,
                    value: NOT_SUBSCRIBED_VALUE,
                }
                .render();
                Self::new(NOT_SUBSCRIBED_FIELD, NOT_SUBSCRIBED_VALUE, html)
            }
        }
    }

    /// The other outcome's field name. An order shows only one of the two.
    #[must_use]
    pub fn superseded_name(&self) -> &'static str {
        if self.name == SUBSCRIBED_FIELD {
            NOT_SUBSCRIBED_FIELD
        } else {
            SUBSCRIBED_FIELD
        }
    }

    fn new(name: &str, value: &str, html: askama::Result<String>) -> Self {
        let rendered = match html {
            Ok(html) => html.trim_end().to_string(),
            Err(e) => {
                warn!(error = %e, field = name, "Failed to render order field, using plain text");
                format!("{FIELD_LABEL}: {value}")
            }
        };

        Self {
            name: name.to_string(),
            label: FIELD_LABEL.to_string(),
            value: value.to_string(),
            rendered,
        }
    }
}

#[cfg(test)]
mod tests {
    use commerce_mailchimp_core::SubscriberId;

    use super::*;

    #[test]
    fn test_subscribed_field_links_to_console() {
        let field = OrderField::from_decision(&OrderFieldDecision::Subscribed {
            subscriber_id: SubscriberId::new("42"),
            console_url: "https://us6.admin.mailchimp.com/lists/members/view?id=42".to_string(),
        });

        assert_eq!(field.name, SUBSCRIBED_FIELD);
        assert_eq!(field.label, "MailChimp status");
        assert_eq!(field.value, "Subscribed");
        assert!(field.rendered.contains("us6.admin.mailchimp.com"));
        assert!(field.rendered.contains("id=42"));
        assert!(field.rendered.contains("subscription details in MailChimp"));
        assert_eq!(field.superseded_name(), NOT_SUBSCRIBED_FIELD);
    }

    #[test]
    fn test_not_subscribed_field() {
        let field = OrderField::from_decision(&OrderFieldDecision::NotSubscribed);

        assert_eq!(field.name, NOT_SUBSCRIBED_FIELD);
        assert_eq!(field.value, "Not Subscribed");
        assert!(field.rendered.contains("Not Subscribed"));
        assert!(!field.rendered.contains("href"));
        assert_eq!(field.superseded_name(), SUBSCRIBED_FIELD);
    }
}
