use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;

use super::PgStore;
use crate::domain::aggregates::{Cart, LineItem, LineItemInput};
use crate::store::{cart_not_found, require_item, require_quantity, CartStore, StoreError};

#[derive(Debug, FromRow)]
struct CartRow {
    user_id: String,
    items: Json<Vec<LineItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self { Cart::restore(row.user_id, row.items.0, row.created_at, row.updated_at) }
}

impl PgStore {
    /// Runs `f` against the cart row under `SELECT ... FOR UPDATE` and writes
    /// the result back in the same transaction. With `create`, a missing cart
    /// is inserted first; otherwise it is `NotFound`.
    async fn with_locked_cart<T, F>(&self, user_id: &str, create: bool, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Cart) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let mut tx = self.pool.begin().await?;
        if create {
            sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT user_id, items, created_at, updated_at FROM carts WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(cart_not_found)?;

        let mut cart = Cart::from(row);
        let out = f(&mut cart)?;

        sqlx::query("UPDATE carts SET items = $2, updated_at = $3 WHERE user_id = $1")
            .bind(user_id)
            .bind(Json(cart.items().to_vec()))
            .bind(cart.updated_at())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::debug!(user_id, items = cart.items().len(), "cart saved");
        Ok(out)
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn get(&self, user_id: &str) -> Result<Vec<LineItem>, StoreError> {
        let items = sqlx::query_scalar::<_, Json<Vec<LineItem>>>("SELECT items FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(items.map(|j| j.0).unwrap_or_default())
    }

    async fn replace(&self, user_id: &str, items: Vec<LineItemInput>) -> Result<Vec<LineItem>, StoreError> {
        self.with_locked_cart(user_id, true, |cart| Ok(cart.replace(items).to_vec())).await
    }

    async fn add_item(&self, user_id: &str, item: LineItemInput) -> Result<Vec<LineItem>, StoreError> {
        let item = require_item(item)?;
        self.with_locked_cart(user_id, true, |cart| {
            cart.add_item(item);
            Ok(cart.items().to_vec())
        })
        .await
    }

    async fn update_quantity(&self, user_id: &str, key: &str, qty: i64) -> Result<Vec<LineItem>, StoreError> {
        let qty = require_quantity(qty)?;
        self.with_locked_cart(user_id, false, |cart| {
            cart.update_quantity(key, qty)?;
            Ok(cart.items().to_vec())
        })
        .await
    }

    async fn remove_item(&self, user_id: &str, key: &str) -> Result<Vec<LineItem>, StoreError> {
        self.with_locked_cart(user_id, false, |cart| {
            cart.remove_item(key)?;
            Ok(cart.items().to_vec())
        })
        .await
        .map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound("Item not found".to_string()),
            other => other,
        })
    }

    async fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO carts (user_id, items) VALUES ($1, '[]') \
             ON CONFLICT (user_id) DO UPDATE SET items = '[]', updated_at = NOW()",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count(&self, user_id: &str) -> Result<u64, StoreError> {
        let items = CartStore::get(self, user_id).await?;
        Ok(Cart::restore(user_id, items, Utc::now(), Utc::now()).item_count())
    }
}
