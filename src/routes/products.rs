use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::aggregates::{Product, ProductFilter, ProductInput};
use crate::domain::value_objects::ProductStatus;
use crate::error::{ApiError, AppJson, AppQuery};
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/api/products", post(create_product))
        .route("/api/products/:id", put(update_product).patch(update_status).delete(delete_product))
        .route("/api/products/:id/status", patch(update_status))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    category: Option<String>,
    size: Option<String>,
    color: Option<String>,
    tag: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
}

impl ListParams {
    fn into_filter(self) -> Result<ProductFilter, ApiError> {
        let present = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let price = |v: String| {
            v.parse::<Decimal>().map_err(|_| ApiError::InvalidArgument(format!("Invalid price: {v}")))
        };
        let price_range = match (present(self.min_price), present(self.max_price)) {
            (Some(min), Some(max)) => Some((price(min)?, price(max)?)),
            _ => None,
        };
        Ok(ProductFilter {
            category: present(self.category),
            size: present(self.size),
            color: present(self.color),
            tag: present(self.tag),
            price_range,
        })
    }
}

async fn list_products(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let filter = params.into_filter()?;
    Ok(Json(state.catalog.list(&filter).await?))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>, ApiError> {
    state.catalog.get(&id).await?.map(Json).ok_or_else(not_found)
}

async fn create_product(
    State(state): State<AppState>,
    AppJson(input): AppJson<ProductInput>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let product = input.into_product(Uuid::now_v7(), Utc::now())?;
    let product = state.catalog.insert(product).await?;
    tracing::info!(id = %product.id, sku = %product.sku, "product created");
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "Product created successfully", "product": product})),
    ))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(input): AppJson<ProductInput>,
) -> Result<Json<Value>, ApiError> {
    let existing = state.catalog.get(&id).await?.ok_or_else(not_found)?;
    let product = input.into_product(existing.id, existing.created_at)?;
    let product = state.catalog.replace(&id, product).await?;
    Ok(Json(json!({"success": true, "message": "Product updated successfully", "product": product})))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(body): AppJson<StatusBody>,
) -> Result<Json<Value>, ApiError> {
    let status = body
        .status
        .as_deref()
        .and_then(|s| s.parse::<ProductStatus>().ok())
        .ok_or_else(|| ApiError::InvalidArgument("Invalid status value".to_string()))?;
    let product = state.catalog.set_status(&id, status).await?;
    Ok(Json(json!({"success": true, "message": "Product status updated successfully", "product": product})))
}

async fn delete_product(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    state.catalog.delete(&id).await?;
    tracing::info!(%id, "product deleted");
    Ok(Json(json!({"success": true, "message": "Product deleted successfully"})))
}

fn not_found() -> ApiError { ApiError::NotFound("Product not found".to_string()) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_range_needs_both_bounds() {
        let params = ListParams { min_price: Some("10".into()), ..Default::default() };
        assert_eq!(params.into_filter().unwrap().price_range, None);

        let params = ListParams { min_price: Some("10".into()), max_price: Some("99.5".into()), ..Default::default() };
        let (min, max) = params.into_filter().unwrap().price_range.unwrap();
        assert_eq!(min, Decimal::from(10));
        assert_eq!(max, Decimal::new(995, 1));
    }

    #[test]
    fn test_bad_price_and_blank_fields() {
        let params = ListParams { min_price: Some("cheap".into()), max_price: Some("5".into()), ..Default::default() };
        assert!(matches!(params.into_filter(), Err(ApiError::InvalidArgument(_))));

        let params = ListParams { category: Some("  ".into()), ..Default::default() };
        assert_eq!(params.into_filter().unwrap().category, None);
    }
}
