//! In-process order store.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use commerce_mailchimp_core::OrderId;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{OrderPropertyBag, StoreError};
use crate::fields::OrderField;

#[derive(Debug, Default)]
struct OrderRecord {
    properties: BTreeMap<String, Value>,
    fields: Vec<OrderField>,
}

/// Orders held in memory. Every order exists implicitly.
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<OrderId, OrderRecord>>,
    property_writes: AtomicUsize,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_properties` batches written so far.
    #[must_use]
    pub fn property_writes(&self) -> usize {
        self.property_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderPropertyBag for MemoryOrderStore {
    async fn properties(
        &self,
        order_id: OrderId,
        keys: &[&str],
    ) -> Result<HashMap<String, Value>, StoreError> {
        let orders = self.orders.read().await;
        let Some(record) = orders.get(&order_id) else {
            return Ok(HashMap::new());
        };

        Ok(keys
            .iter()
            .filter_map(|key| {
                record
                    .properties
                    .get(*key)
                    .map(|value| ((*key).to_string(), value.clone()))
            })
            .collect())
    }

    async fn set_properties(
        &self,
        order_id: OrderId,
        properties: Vec<(String, Value)>,
    ) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        let record = orders.entry(order_id).or_default();
        record.properties.extend(properties);
        self.property_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn set_order_field(
        &self,
        order_id: OrderId,
        field: &OrderField,
    ) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        let record = orders.entry(order_id).or_default();
        record.fields.retain(|existing| existing.name != field.name);
        record.fields.push(field.clone());
        Ok(())
    }

    async fn remove_order_field(&self, order_id: OrderId, name: &str) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if let Some(record) = orders.get_mut(&order_id) {
            record.fields.retain(|existing| existing.name != name);
        }
        Ok(())
    }

    async fn order_fields(&self, order_id: OrderId) -> Result<Vec<OrderField>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders
            .get(&order_id)
            .map(|record| record.fields.clone())
            .unwrap_or_default())
    }
}
