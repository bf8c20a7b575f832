//! `PostgreSQL` adapter for the order property bag.

use std::collections::HashMap;

use async_trait::async_trait;
use commerce_mailchimp_core::OrderId;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::fields::OrderField;
use crate::store::{OrderPropertyBag, StoreError};

/// Order properties and fields stored in the `checkout` schema.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderPropertyBag for PgOrderStore {
    #[instrument(skip(self, keys), fields(order_id = %order_id))]
    async fn properties(
        &self,
        order_id: OrderId,
        keys: &[&str],
    ) -> Result<HashMap<String, Value>, StoreError> {
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();

        let rows = sqlx::query(
            r"
            SELECT key, value
            FROM checkout.order_property
            WHERE order_id = $1 AND key = ANY($2)
            ",
        )
        .bind(order_id)
        .bind(&keys)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(String, Value), StoreError> {
                let key: String = row.try_get("key")?;
                let Json(value): Json<Value> = row.try_get("value")?;
                Ok((key, value))
            })
            .collect()
    }

    #[instrument(skip(self, properties), fields(order_id = %order_id, count = properties.len()))]
    async fn set_properties(
        &self,
        order_id: OrderId,
        properties: Vec<(String, Value)>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in properties {
            sqlx::query(
                r"
                INSERT INTO checkout.order_property (order_id, key, value)
                VALUES ($1, $2, $3)
                ON CONFLICT (order_id, key)
                DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                ",
            )
            .bind(order_id)
            .bind(key)
            .bind(Json(value))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, field), fields(order_id = %order_id, field = %field.name))]
    async fn set_order_field(
        &self,
        order_id: OrderId,
        field: &OrderField,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO checkout.order_field (order_id, name, label, value, rendered)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (order_id, name)
            DO UPDATE SET label = EXCLUDED.label,
                          value = EXCLUDED.value,
                          rendered = EXCLUDED.rendered,
                          updated_at = NOW()
            ",
        )
        .bind(order_id)
        .bind(&field.name)
        .bind(&field.label)
        .bind(&field.value)
        .bind(&field.rendered)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    async fn remove_order_field(&self, order_id: OrderId, name: &str) -> Result<(), StoreError> {
        sqlx::query(
            r"
            DELETE FROM checkout.order_field
            WHERE order_id = $1 AND name = $2
            ",
        )
        .bind(order_id)
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn order_fields(&self, order_id: OrderId) -> Result<Vec<OrderField>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT name, label, value, rendered
            FROM checkout.order_field
            WHERE order_id = $1
            ORDER BY name
            ",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<OrderField, StoreError> {
                Ok(OrderField {
                    name: row.try_get("name")?,
                    label: row.try_get("label")?,
                    value: row.try_get("value")?,
                    rendered: row.try_get("rendered")?,
                })
            })
            .collect()
    }
}
