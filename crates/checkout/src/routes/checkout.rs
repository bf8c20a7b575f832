//! Checkout extension point handlers.
//!
//! The host checkout controller calls these around each step and on every
//! order state transition.

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
};
use commerce_mailchimp_core::{CheckoutStep, OrderId, OrderState, OrderSubscriptionState};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, add_breadcrumb};
use crate::fields::OrderField;
use crate::pipeline::CheckoutAddresses;
use crate::state::Mailchimp;

/// Body of the before-step hook.
#[derive(Debug, Deserialize)]
pub struct BeforeStepRequest {
    /// Submitted form values of the previous step.
    #[serde(default)]
    pub form: HashMap<String, Value>,
    #[serde(flatten)]
    pub addresses: CheckoutAddresses,
}

/// Body of the after-step hook.
#[derive(Debug, Deserialize)]
pub struct AfterStepRequest {
    /// The step's view data.
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Body of the order transition hook.
#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub from: OrderState,
    pub to: OrderState,
    #[serde(flatten)]
    pub addresses: CheckoutAddresses,
}

/// `POST /checkout/{order_id}/steps/{step}/before`
pub async fn before_step(
    State(mailchimp): State<Mailchimp>,
    Path((order_id, step)): Path<(OrderId, String)>,
    Json(request): Json<BeforeStepRequest>,
) -> Result<Json<OrderSubscriptionState>> {
    // Only string form values matter (checkboxes, text inputs).
    let form: HashMap<String, String> = request
        .form
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            _ => None,
        })
        .collect();

    let state = mailchimp
        .pipeline
        .before_step(
            order_id,
            &CheckoutStep::from_key(&step),
            &form,
            &request.addresses,
        )
        .await?;

    Ok(Json(state))
}

/// `POST /checkout/{order_id}/steps/{step}/after`
pub async fn after_step(
    State(mailchimp): State<Mailchimp>,
    Path((order_id, step)): Path<(OrderId, String)>,
    Json(request): Json<AfterStepRequest>,
) -> Result<Json<Map<String, Value>>> {
    let mut data = request.data;
    mailchimp
        .pipeline
        .after_step(order_id, &CheckoutStep::from_key(&step), &mut data)
        .await?;

    Ok(Json(data))
}

/// `POST /orders/{order_id}/transitions`
///
/// Responds with the attached order field, or `null` when the transition is
/// not a finalization.
pub async fn transition(
    State(mailchimp): State<Mailchimp>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Option<OrderField>>> {
    let field = mailchimp
        .pipeline
        .order_transition(order_id, request.from, request.to, &request.addresses)
        .await?;

    if let Some(field) = &field {
        add_breadcrumb(
            "checkout",
            "Order finalized",
            &[("order_id", &order_id.to_string()), ("field", &field.name)],
        );
    }

    Ok(Json(field))
}
