use axum::extract::{Path, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::aggregates::LineItemInput;
use crate::error::{ApiError, AppJson};
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/cart/:userId", get(get_cart).post(replace_cart))
        .route("/api/cart/:userId/add", post(add_item))
        .route("/api/cart/:userId/update/:itemKey", patch(update_quantity))
        .route("/api/cart/:userId/remove/:itemKey", delete(remove_item))
        .route("/api/cart/:userId/clear", delete(clear_cart))
        .route("/api/cart/:userId/count", get(count_items))
}

async fn get_cart(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let items = state.carts.get(&user_id).await?;
    Ok(Json(json!({"success": true, "items": items})))
}

#[derive(Debug, Default, Deserialize)]
struct ReplaceBody {
    #[serde(default)]
    items: Vec<LineItemInput>,
}

async fn replace_cart(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppJson(body): AppJson<ReplaceBody>,
) -> Result<Json<Value>, ApiError> {
    let submitted = body.items.len();
    let items = state.carts.replace(&user_id, body.items).await?;
    tracing::debug!(%user_id, submitted, stored = items.len(), "cart replaced");
    Ok(Json(json!({"success": true, "items": items})))
}

async fn add_item(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppJson(item): AppJson<LineItemInput>,
) -> Result<Json<Value>, ApiError> {
    let items = state.carts.add_item(&user_id, item).await?;
    Ok(Json(json!({"success": true, "message": "Item added to cart", "items": items})))
}

#[derive(Debug, Deserialize)]
struct QuantityBody {
    #[serde(default)]
    qty: Option<Value>,
}

async fn update_quantity(
    State(state): State<AppState>,
    Path((user_id, item_key)): Path<(String, String)>,
    AppJson(body): AppJson<QuantityBody>,
) -> Result<Json<Value>, ApiError> {
    let qty = body
        .qty
        .as_ref()
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::InvalidArgument("Invalid quantity".to_string()))?;
    let items = state.carts.update_quantity(&user_id, &item_key, qty).await?;
    Ok(Json(json!({"success": true, "message": "Cart updated", "items": items})))
}

async fn remove_item(
    State(state): State<AppState>,
    Path((user_id, item_key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let items = state.carts.remove_item(&user_id, &item_key).await?;
    Ok(Json(json!({"success": true, "message": "Item removed from cart", "items": items})))
}

async fn clear_cart(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Json<Value>, ApiError> {
    state.carts.clear(&user_id).await?;
    Ok(Json(json!({"success": true, "message": "Cart cleared"})))
}

async fn count_items(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let count = state.carts.count(&user_id).await?;
    Ok(Json(json!({"count": count})))
}
