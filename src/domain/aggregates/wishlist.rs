//! Wishlist membership rows.
//!
//! Presence of a row is the membership signal; at most one row exists per
//! (user, product) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::product::Product;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub added_at: DateTime<Utc>,
}

impl WishlistEntry {
    pub fn new(user_id: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            product_id: product_id.into(),
            added_at: Utc::now(),
        }
    }
}

/// Entry joined with its catalog product.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    #[serde(flatten)]
    pub entry: WishlistEntry,
    pub product: Product,
}

/// Inner join on product id, newest first. Entries whose product is gone are dropped.
pub fn join_with_catalog(entries: Vec<WishlistEntry>, products: &HashMap<String, Product>) -> Vec<WishlistItem> {
    let mut items: Vec<WishlistItem> = entries
        .into_iter()
        .filter_map(|entry| {
            let product = products.get(&entry.product_id)?.clone();
            Some(WishlistItem { entry, product })
        })
        .collect();
    items.sort_by(|a, b| b.entry.added_at.cmp(&a.entry.added_at));
    items
}

/// Outcome of a toggle: the membership state after the call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggled {
    Added,
    Removed,
}

impl Toggled {
    pub fn in_wishlist(self) -> bool { matches!(self, Self::Added) }
}
