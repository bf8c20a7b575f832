//! Request and response bodies for the Mailchimp API.

use std::collections::BTreeMap;

use commerce_mailchimp_core::{Address, GroupSelections, SubscriberId};
use serde::{Deserialize, Deserializer, Serialize};

/// Outcome of a membership check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    Subscribed(SubscriberId),
    NotSubscribed,
}

/// Member status sent when subscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    /// Awaiting confirmation (double opt-in).
    Pending,
    Subscribed,
}

impl MemberStatus {
    #[must_use]
    pub const fn for_double_opt_in(double_opt_in: bool) -> Self {
        if double_opt_in {
            Self::Pending
        } else {
            Self::Subscribed
        }
    }
}

/// Merge fields carried on a new member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeFields {
    #[serde(rename = "FNAME")]
    pub first_name: String,
    #[serde(rename = "LNAME")]
    pub last_name: String,
}

/// Body of `POST lists/{list}/members/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscribePayload {
    pub email_address: String,
    pub status: MemberStatus,
    pub merge_fields: MergeFields,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub interests: BTreeMap<String, bool>,
}

impl SubscribePayload {
    /// Build the subscribe body for an order address.
    #[must_use]
    pub fn new(
        email: String,
        address: &Address,
        double_opt_in: bool,
        groups: &GroupSelections,
    ) -> Self {
        let name = address.contact_name();
        Self {
            email_address: email,
            status: MemberStatus::for_double_opt_in(double_opt_in),
            merge_fields: MergeFields {
                first_name: name.first,
                last_name: name.last,
            },
            interests: groups
                .group_ids()
                .map(|id| (id.as_str().to_owned(), true))
                .collect(),
        }
    }
}

/// The parts of a member resource we read.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MemberResponse {
    #[serde(deserialize_with = "deserialize_web_id")]
    pub web_id: SubscriberId,
}

/// A selectable `{id, label}` entry for admin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOption {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListsResponse {
    #[serde(default)]
    pub lists: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoriesResponse {
    #[serde(default)]
    pub categories: Vec<TitledResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InterestsResponse {
    #[serde(default)]
    pub interests: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NamedResource {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TitledResource {
    pub id: String,
    pub title: String,
}

impl From<NamedResource> for ListOption {
    fn from(resource: NamedResource) -> Self {
        Self {
            id: resource.id,
            label: resource.name,
        }
    }
}

impl From<TitledResource> for ListOption {
    fn from(resource: TitledResource) -> Self {
        Self {
            id: resource.id,
            label: resource.title,
        }
    }
}

/// `web_id` is a number in the API; accept a string too.
fn deserialize_web_id<'de, D>(deserializer: D) -> Result<SubscriberId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WebId {
        Number(u64),
        Text(String),
    }

    let id = match WebId::deserialize(deserializer)? {
        WebId::Number(n) => n.to_string(),
        WebId::Text(s) => s,
    };

    if id.is_empty() {
        return Err(serde::de::Error::custom("empty web_id"));
    }
    Ok(SubscriberId::new(id))
}
