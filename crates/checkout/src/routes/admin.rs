//! Admin configuration helpers: list and group pickers.

use axum::{
    Json,
    extract::{Path, State},
};
use commerce_mailchimp_core::ListId;
use serde::Serialize;

use crate::error::Result;
use crate::mailchimp::{CategoryGroups, ListOption};
use crate::state::Mailchimp;

/// Lists on the account, with the configured one marked.
#[derive(Debug, Serialize)]
pub struct ListsResponse {
    pub selected: String,
    pub lists: Vec<ListOption>,
}

/// `GET /admin/mailchimp/lists`
pub async fn lists(State(mailchimp): State<Mailchimp>) -> Result<Json<ListsResponse>> {
    let lists = mailchimp.metadata.lists().await?;
    Ok(Json(ListsResponse {
        selected: mailchimp.list_id.to_string(),
        lists: lists.as_ref().clone(),
    }))
}

/// `GET /admin/mailchimp/lists/{list_id}/categories`
pub async fn categories(
    State(mailchimp): State<Mailchimp>,
    Path(list_id): Path<String>,
) -> Result<Json<Vec<CategoryGroups>>> {
    let tree = mailchimp
        .metadata
        .category_tree(&ListId::new(list_id), &mailchimp.groups)
        .await?;
    Ok(Json(tree))
}
