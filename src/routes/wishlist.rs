use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::guarded;
use crate::auth::{Channel, RoutePolicy};
use crate::domain::aggregates::{Toggled, WishlistItem};
use crate::error::{ApiError, AppJson};
use crate::state::AppState;

/// Listing needs the session cookie and the bearer token; the rest only the bearer.
const LIST_POLICY: RoutePolicy = RoutePolicy::new(Channel::Both).own_path();
const ITEM_POLICY: RoutePolicy = RoutePolicy::new(Channel::Bearer).own_path();

pub(super) fn routes(state: &AppState) -> Router<AppState> {
    let (list_policy, item_policy) = if state.access.wishlist_auth {
        (LIST_POLICY, ITEM_POLICY)
    } else {
        (RoutePolicy::OPEN, RoutePolicy::OPEN)
    };

    let listing = Router::new().route("/api/wishlist/:userId", get(list_wishlist));
    let items = Router::new()
        .route("/api/wishlist/:userId/toggle", post(toggle))
        .route("/api/wishlist/:userId/remove/:productId", delete(remove))
        .route("/api/wishlist/:userId/check/:productId", get(check))
        .route("/api/wishlist/:userId/count", get(count));

    guarded(listing, state, list_policy).merge(guarded(items, state, item_policy))
}

async fn list_wishlist(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<WishlistItem>>, ApiError> {
    Ok(Json(state.wishlists.list(&user_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToggleBody {
    #[serde(default)]
    product_id: Option<String>,
}

async fn toggle(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppJson(body): AppJson<ToggleBody>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let product_id = body
        .product_id
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidArgument("Product ID is required".to_string()))?;
    let outcome = state.wishlists.toggle(&user_id, &product_id).await?;
    let (status, message) = match outcome {
        Toggled::Added => (StatusCode::CREATED, "Product added to wishlist"),
        Toggled::Removed => (StatusCode::OK, "Product removed from wishlist"),
    };
    Ok((status, Json(json!({"success": true, "message": message, "inWishlist": outcome.in_wishlist()}))))
}

async fn remove(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state.wishlists.remove(&user_id, &product_id).await?;
    Ok(Json(json!({"success": true, "message": "Product removed from wishlist"})))
}

async fn check(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let in_wishlist = state.wishlists.is_member(&user_id, &product_id).await?;
    Ok(Json(json!({"inWishlist": in_wishlist})))
}

async fn count(State(state): State<AppState>, Path(user_id): Path<String>) -> Result<Json<Value>, ApiError> {
    let count = state.wishlists.count(&user_id).await?;
    Ok(Json(json!({"count": count})))
}
