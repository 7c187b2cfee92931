use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::catalog::ProductRow;
use super::PgStore;
use crate::domain::aggregates::{Product, Toggled, WishlistEntry, WishlistItem};
use crate::store::{canonical_product_id, product_not_found, StoreError, WishlistStore};

#[derive(Debug, FromRow)]
struct WishlistRow {
    w_id: Uuid,
    user_id: String,
    product_id: String,
    added_at: DateTime<Utc>,
    #[sqlx(flatten)]
    product: ProductRow,
}

impl TryFrom<WishlistRow> for WishlistItem {
    type Error = StoreError;

    fn try_from(row: WishlistRow) -> Result<Self, Self::Error> {
        Ok(WishlistItem {
            entry: WishlistEntry {
                id: row.w_id,
                user_id: row.user_id,
                product_id: row.product_id,
                added_at: row.added_at,
            },
            product: Product::try_from(row.product)?,
        })
    }
}

#[async_trait]
impl WishlistStore for PgStore {
    async fn toggle(&self, user_id: &str, product_id: &str) -> Result<Toggled, StoreError> {
        let id = canonical_product_id(product_id).ok_or_else(product_not_found)?;
        let product_id = id.to_string();
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(product_not_found());
        }

        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(&product_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let outcome = if removed > 0 {
            Toggled::Removed
        } else {
            let entry = WishlistEntry::new(user_id, product_id.as_str());
            sqlx::query(
                "INSERT INTO wishlists (id, user_id, product_id, added_at) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (user_id, product_id) DO NOTHING",
            )
            .bind(entry.id)
            .bind(&entry.user_id)
            .bind(&entry.product_id)
            .bind(entry.added_at)
            .execute(&mut *tx)
            .await?;
            Toggled::Added
        };
        tx.commit().await?;
        tracing::debug!(user_id, %product_id, ?outcome, "wishlist toggled");
        Ok(outcome)
    }

    async fn remove(&self, user_id: &str, product_id: &str) -> Result<(), StoreError> {
        let not_found = || StoreError::NotFound("Item not found in wishlist".to_string());
        let id = canonical_product_id(product_id).ok_or_else(not_found)?;
        let result = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found());
        }
        Ok(())
    }

    async fn is_member(&self, user_id: &str, product_id: &str) -> Result<bool, StoreError> {
        let Some(id) = canonical_product_id(product_id) else { return Ok(false) };
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM wishlists WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count(&self, user_id: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wishlists WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.unsigned_abs())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<WishlistItem>, StoreError> {
        let rows = sqlx::query_as::<_, WishlistRow>(
            "SELECT w.id AS w_id, w.user_id, w.product_id, w.added_at, p.* \
             FROM wishlists w JOIN products p ON p.id::text = w.product_id \
             WHERE w.user_id = $1 ORDER BY w.added_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WishlistItem::try_from).collect()
    }
}
