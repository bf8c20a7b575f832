//! Short-lived cache for admin configuration lookups.
//!
//! While an administrator edits the integration settings the list picker and
//! the group checkboxes are re-rendered on every change. Caching the lookups
//! for a minute keeps that from turning into a burst of API calls. Nothing on
//! the checkout path reads through this cache.

use std::sync::Arc;
use std::time::Duration;

use commerce_mailchimp_core::{GroupId, GroupSelections, ListId};
use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, instrument};

use super::MailchimpError;
use super::client::MailchimpClient;
use super::types::ListOption;

/// Entries expire after one minute.
const TTL: Duration = Duration::from_secs(60);

/// An interest category with its groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryGroups {
    pub id: String,
    pub label: String,
    pub groups: Vec<GroupOption>,
}

/// A group checkbox, marked when the group is in the configured selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOption {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

/// Admin metadata lookups behind a 60 second cache.
#[derive(Clone)]
pub struct MetadataCache {
    client: MailchimpClient,
    cache: Cache<String, Arc<Vec<ListOption>>>,
}

impl MetadataCache {
    #[must_use]
    pub fn new(client: MailchimpClient) -> Self {
        Self::with_ttl(client, TTL)
    }

    #[must_use]
    pub fn with_ttl(client: MailchimpClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(ttl)
            .build();
        Self { client, cache }
    }

    /// Lists on the account.
    ///
    /// # Errors
    ///
    /// Returns error if the lists are not cached and the API request fails.
    pub async fn lists(&self) -> Result<Arc<Vec<ListOption>>, MailchimpError> {
        self.cached("lists".to_string(), || self.client.get_lists())
            .await
    }

    /// Interest categories of a list.
    ///
    /// # Errors
    ///
    /// Returns error if the categories are not cached and the API request fails.
    pub async fn categories(
        &self,
        list_id: &ListId,
    ) -> Result<Arc<Vec<ListOption>>, MailchimpError> {
        self.cached(format!("categories_{list_id}"), || {
            self.client.get_group_categories(list_id)
        })
        .await
    }

    /// Groups within a category.
    ///
    /// # Errors
    ///
    /// Returns error if the groups are not cached and the API request fails.
    pub async fn groups(
        &self,
        list_id: &ListId,
        category_id: &str,
    ) -> Result<Arc<Vec<ListOption>>, MailchimpError> {
        self.cached(format!("groups_{category_id}{list_id}"), || {
            self.client.get_groups(list_id, category_id)
        })
        .await
    }

    /// Categories of a list with their groups, marking configured selections.
    ///
    /// # Errors
    ///
    /// Returns error if any uncached lookup fails.
    #[instrument(skip(self, selected), fields(list_id = %list_id))]
    pub async fn category_tree(
        &self,
        list_id: &ListId,
        selected: &GroupSelections,
    ) -> Result<Vec<CategoryGroups>, MailchimpError> {
        let categories = self.categories(list_id).await?;
        let mut tree = Vec::with_capacity(categories.len());

        for category in categories.iter() {
            let groups = self.groups(list_id, &category.id).await?;
            tree.push(CategoryGroups {
                id: category.id.clone(),
                label: category.label.clone(),
                groups: groups
                    .iter()
                    .map(|group| GroupOption {
                        id: group.id.clone(),
                        label: group.label.clone(),
                        selected: selected.contains(&GroupId::new(group.id.as_str())),
                    })
                    .collect(),
            });
        }

        Ok(tree)
    }

    async fn cached<F, Fut>(
        &self,
        key: String,
        fetch: F,
    ) -> Result<Arc<Vec<ListOption>>, MailchimpError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ListOption>, MailchimpError>>,
    {
        if let Some(hit) = self.cache.get(&key).await {
            debug!(key = %key, "Cache hit for Mailchimp metadata");
            return Ok(hit);
        }

        let value = Arc::new(fetch().await?);
        self.cache.insert(key, Arc::clone(&value)).await;
        Ok(value)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use commerce_mailchimp_core::AddressType;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::MailchimpConfig;
    use crate::mailchimp::Region;

    fn client(server: &MockServer) -> MailchimpClient {
        MailchimpClient::new(&MailchimpConfig {
            api_key: SecretString::from("0123456789abcdef-us6"),
            region: Region::from_api_key("0123456789abcdef-us6").unwrap(),
            list_id: ListId::new("abc"),
            address_type: AddressType::Billing,
            double_opt_in: false,
            groups: GroupSelections::default(),
            api_host: "mailchimp.com".to_string(),
            api_base_url: Some(format!("{}/3.0/", server.uri())),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_lists_are_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3.0/lists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "lists": [{ "id": "abc", "name": "Newsletter" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = MetadataCache::new(client(&server));
        let first = cache.lists().await.unwrap();
        let second = cache.lists().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3.0/lists"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let cache = MetadataCache::new(client(&server));
        assert!(cache.lists().await.is_err());
        assert!(cache.lists().await.is_err());
    }

    #[tokio::test]
    async fn test_category_tree_marks_selection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3.0/lists/abc/interest-categories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "categories": [{ "id": "cat1", "title": "Topics" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3.0/lists/abc/interest-categories/cat1/interests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "interests": [
                    { "id": "g1", "name": "Recipes" },
                    { "id": "g2", "name": "Offers" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let cache = MetadataCache::new(client(&server));
        let selected = GroupSelections::parse("cat1:g2");
        let list = ListId::new("abc");

        let tree = cache.category_tree(&list, &selected).await.unwrap();
        let again = cache.category_tree(&list, &selected).await.unwrap();
        assert_eq!(tree, again);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].label, "Topics");
        assert_eq!(
            tree[0]
                .groups
                .iter()
                .map(|g| (g.id.as_str(), g.selected))
                .collect::<Vec<_>>(),
            vec![("g1", false), ("g2", true)]
        );
    }
}
