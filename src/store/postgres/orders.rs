use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::PgStore;
use crate::domain::aggregates::{Order, OrderStatus};
use crate::store::{OrderStore, StoreError};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: Uuid,
    user_email: String,
    items: Json<Vec<Value>>,
    total: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            user_email: row.user_email,
            items: row.items.0,
            total: row.total,
            status: OrderStatus::parse_lossy(&row.status),
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn list_for_email(&self, email: &str) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_email, items, total, status, created_at FROM orders \
             WHERE user_email = $1 ORDER BY created_at DESC",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }
}
