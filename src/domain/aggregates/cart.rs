//! Cart Aggregate
//!
//! One cart per caller-supplied user id. Line items are identified by their
//! `key`, never by product id: the same product may appear under two keys
//! (different size/colour selections) and those rows are never merged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub key: String,
    pub product_id: String,
    pub qty: u32,
    /// Display snapshot sent by the storefront (name, price, image, size...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineItem {
    pub fn new(key: impl Into<String>, product_id: impl Into<String>, qty: u32) -> Self {
        Self { key: key.into(), product_id: product_id.into(), qty, extra: Map::new() }
    }
}

/// Loosely-typed line item as it arrives over the wire.
///
/// Full-cart replacement drops invalid rows instead of rejecting the request,
/// so validation happens here rather than in serde.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub product_id: Option<Value>,
    #[serde(default)]
    pub qty: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineItemInput {
    /// Returns the item if it has a key, a product id and a quantity > 0.
    pub fn validate(self) -> Option<LineItem> {
        let key = non_empty_string(self.key?)?;
        let product_id = non_empty_string(self.product_id?)?;
        let qty = self.qty?.as_u64().filter(|q| *q > 0)?;
        let qty = u32::try_from(qty).ok()?;
        Some(LineItem { key, product_id, qty, extra: self.extra })
    }
}

fn non_empty_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Clone, Debug)]
pub struct Cart {
    user_id: String,
    items: Vec<LineItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self { user_id: user_id.into(), items: vec![], created_at: now, updated_at: now }
    }

    pub fn restore(
        user_id: impl Into<String>,
        items: Vec<LineItem>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self { user_id: user_id.into(), items, created_at, updated_at }
    }

    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn into_items(self) -> Vec<LineItem> { self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Sum of quantities across all line items.
    pub fn item_count(&self) -> u64 { self.items.iter().map(|i| u64::from(i.qty)).sum() }

    /// Replaces the whole item list with the valid subset of `inputs`.
    pub fn replace(&mut self, inputs: Vec<LineItemInput>) -> &[LineItem] {
        self.items = inputs.into_iter().filter_map(LineItemInput::validate).collect();
        self.touch();
        &self.items
    }

    /// Merges by key: an existing key has its quantity incremented.
    pub fn add_item(&mut self, item: LineItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.key == item.key) {
            existing.qty = existing.qty.saturating_add(item.qty);
        } else {
            self.items.push(item);
        }
        self.touch();
    }

    /// Sets an absolute quantity; zero removes the line.
    pub fn update_quantity(&mut self, key: &str, qty: u32) -> Result<(), CartError> {
        let index = self
            .items
            .iter()
            .position(|i| i.key == key)
            .ok_or_else(|| CartError::ItemNotFound(key.to_string()))?;
        if qty == 0 {
            self.items.remove(index);
        } else {
            self.items[index].qty = qty;
        }
        self.touch();
        Ok(())
    }

    pub fn remove_item(&mut self, key: &str) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.key != key);
        if self.items.len() == before { return Err(CartError::ItemNotFound(key.to_string())); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.items.clear(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Item not found in cart: {0}")]
    ItemNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: Value) -> LineItemInput { serde_json::from_value(value).unwrap() }

    #[test]
    fn test_add_merges_by_key() {
        let mut cart = Cart::new("u1");
        cart.add_item(LineItem::new("p1-m", "p1", 2));
        cart.add_item(LineItem::new("p1-m", "p1", 3));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].qty, 5); // Merged
    }

    #[test]
    fn test_same_product_under_two_keys_stays_split() {
        let mut cart = Cart::new("u1");
        cart.add_item(LineItem::new("p1-s", "p1", 1));
        cart.add_item(LineItem::new("p1-l", "p1", 1));
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.item_count(), 2);
    }

    #[test]
    fn test_update_zero_removes_line() {
        let mut cart = Cart::new("u1");
        cart.add_item(LineItem::new("a", "p1", 4));
        cart.update_quantity("a", 7).unwrap();
        assert_eq!(cart.items()[0].qty, 7);
        cart.update_quantity("a", 0).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.update_quantity("a", 1), Err(CartError::ItemNotFound("a".into())));
    }

    #[test]
    fn test_remove_missing_key_fails() {
        let mut cart = Cart::new("u1");
        cart.add_item(LineItem::new("a", "p1", 1));
        assert!(cart.remove_item("b").is_err());
        cart.remove_item("a").unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_replace_drops_invalid_rows() {
        let mut cart = Cart::new("u1");
        let stored = cart.replace(vec![
            input(json!({"key": "a", "productId": "p1", "qty": 0})),
            input(json!({"key": "b", "productId": "p2", "qty": 2, "size": "M"})),
            input(json!({"productId": "p3", "qty": 1})),
            input(json!({"key": "c", "productId": "", "qty": 1})),
            input(json!({"key": "d", "productId": "p4", "qty": -3})),
        ]);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].key, "b");
        assert_eq!(stored[0].extra.get("size"), Some(&json!("M")));
    }

    #[test]
    fn test_item_count_sums_quantities() {
        let mut cart = Cart::new("u1");
        for (key, qty) in [("a", 2), ("b", 3), ("c", 5)] {
            cart.add_item(LineItem::new(key, "p", qty));
        }
        assert_eq!(cart.item_count(), 10);
        cart.clear();
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_line_item_wire_shape() {
        let item: LineItem = serde_json::from_value(json!({
            "key": "k", "productId": "p", "qty": 1, "name": "Abaya"
        }))
        .unwrap();
        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["productId"], "p");
        assert_eq!(back["name"], "Abaya");
    }
}
