use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{conflict_on_unique, PgStore};
use crate::domain::aggregates::{Product, ProductFilter};
use crate::domain::value_objects::{ProductStatus, Sku};
use crate::store::{product_not_found, CatalogStore, StoreError};

const DUPLICATE_SKU: &str = "Product with this SKU already exists";

#[derive(Debug, FromRow)]
pub(super) struct ProductRow {
    id: Uuid,
    sku: String,
    product_name: String,
    description: Option<String>,
    main_category: Option<String>,
    sizes: Vec<String>,
    colors: Vec<String>,
    tags: Vec<String>,
    images: Vec<String>,
    old_price: Option<Decimal>,
    new_price: Decimal,
    stock: i64,
    status: String,
    attributes: Json<Map<String, Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| StoreError::DataCorruption(format!("product {}: {what}", row.id));
        let sku = Sku::new(row.sku.clone()).map_err(|e| corrupt(e.to_string()))?;
        let status = row.status.parse::<ProductStatus>().map_err(|e| corrupt(e.to_string()))?;
        let stock = u32::try_from(row.stock).map_err(|_| corrupt(format!("stock out of range: {}", row.stock)))?;
        Ok(Product {
            id: row.id,
            sku,
            product_name: row.product_name,
            description: row.description,
            main_category: row.main_category,
            sizes: row.sizes,
            colors: row.colors,
            tags: row.tags,
            images: row.images,
            old_price: row.old_price,
            new_price: row.new_price,
            stock,
            status,
            attributes: row.attributes.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM products WHERE TRUE");
        if let Some(category) = &filter.category {
            qb.push(" AND main_category = ").push_bind(category.clone());
        }
        for (value, column) in [(&filter.size, "sizes"), (&filter.color, "colors"), (&filter.tag, "tags")] {
            if let Some(value) = value {
                qb.push(" AND ").push_bind(value.clone()).push(format!(" = ANY({column})"));
            }
        }
        if let Some((min, max)) = filter.price_range {
            qb.push(" AND new_price BETWEEN ").push_bind(min).push(" AND ").push_bind(max);
        }
        qb.push(" ORDER BY created_at DESC");
        let rows = qb.build_query_as::<ProductRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let Ok(id) = Uuid::parse_str(id) else { return Ok(None) };
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Product::try_from).transpose()
    }

    async fn insert(&self, product: Product) -> Result<Product, StoreError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "INSERT INTO products (id, sku, product_name, description, main_category, sizes, colors, tags, images, \
             old_price, new_price, stock, status, attributes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) RETURNING *",
        )
        .bind(product.id)
        .bind(product.sku.as_str())
        .bind(&product.product_name)
        .bind(&product.description)
        .bind(&product.main_category)
        .bind(&product.sizes)
        .bind(&product.colors)
        .bind(&product.tags)
        .bind(&product.images)
        .bind(product.old_price)
        .bind(product.new_price)
        .bind(i64::from(product.stock))
        .bind(product.status.as_str())
        .bind(Json(&product.attributes))
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_SKU))?;
        tracing::debug!(sku = %product.sku, id = %product.id, "product inserted");
        Product::try_from(row)
    }

    async fn replace(&self, id: &str, product: Product) -> Result<Product, StoreError> {
        let id = Uuid::parse_str(id).map_err(|_| product_not_found())?;
        let row = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET sku = $2, product_name = $3, description = $4, main_category = $5, sizes = $6, \
             colors = $7, tags = $8, images = $9, old_price = $10, new_price = $11, stock = $12, status = $13, \
             attributes = $14, updated_at = $15 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(product.sku.as_str())
        .bind(&product.product_name)
        .bind(&product.description)
        .bind(&product.main_category)
        .bind(&product.sizes)
        .bind(&product.colors)
        .bind(&product.tags)
        .bind(&product.images)
        .bind(product.old_price)
        .bind(product.new_price)
        .bind(i64::from(product.stock))
        .bind(product.status.as_str())
        .bind(Json(&product.attributes))
        .bind(product.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_SKU))?
        .ok_or_else(product_not_found)?;
        Product::try_from(row)
    }

    async fn set_status(&self, id: &str, status: ProductStatus) -> Result<Product, StoreError> {
        let id = Uuid::parse_str(id).map_err(|_| product_not_found())?;
        let row = sqlx::query_as::<_, ProductRow>(
            "UPDATE products SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(product_not_found)?;
        Product::try_from(row)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = Uuid::parse_str(id).map_err(|_| product_not_found())?;
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(product_not_found());
        }
        tracing::debug!(%id, "product deleted");
        Ok(())
    }
}
