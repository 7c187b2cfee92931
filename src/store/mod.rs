//! Store clients.
//!
//! One trait per collection so handlers receive explicit, swappable clients.
//! `postgres` is the production backend; `memory` backs tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{
    CartError, LineItem, LineItemInput, Order, Product, ProductFilter, ProfilePatch, Registration, Toggled, User,
    WishlistItem,
};
use crate::domain::value_objects::{ProductStatus, Role};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Data corruption: {0}")]
    DataCorruption(String),
}

impl From<CartError> for StoreError {
    fn from(err: CartError) -> Self { StoreError::NotFound(err.to_string()) }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError>;

    /// Unknown or malformed ids yield `None`.
    async fn get(&self, id: &str) -> Result<Option<Product>, StoreError>;

    /// Fails with `Conflict` when the SKU is already taken.
    async fn insert(&self, product: Product) -> Result<Product, StoreError>;

    /// Replaces every field except `id` and `createdAt`.
    async fn replace(&self, id: &str, product: Product) -> Result<Product, StoreError>;

    async fn set_status(&self, id: &str, status: ProductStatus) -> Result<Product, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Missing cart reads as empty.
    async fn get(&self, user_id: &str) -> Result<Vec<LineItem>, StoreError>;

    /// Stores the valid subset of `items` and returns what was stored.
    async fn replace(&self, user_id: &str, items: Vec<LineItemInput>) -> Result<Vec<LineItem>, StoreError>;

    /// Merges by key, creating the cart on first use.
    async fn add_item(&self, user_id: &str, item: LineItemInput) -> Result<Vec<LineItem>, StoreError>;

    /// Absolute set; zero removes the line.
    async fn update_quantity(&self, user_id: &str, key: &str, qty: i64) -> Result<Vec<LineItem>, StoreError>;

    async fn remove_item(&self, user_id: &str, key: &str) -> Result<Vec<LineItem>, StoreError>;

    async fn clear(&self, user_id: &str) -> Result<(), StoreError>;

    async fn count(&self, user_id: &str) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait WishlistStore: Send + Sync {
    /// Product must exist in the catalog.
    async fn toggle(&self, user_id: &str, product_id: &str) -> Result<Toggled, StoreError>;

    async fn remove(&self, user_id: &str, product_id: &str) -> Result<(), StoreError>;

    async fn is_member(&self, user_id: &str, product_id: &str) -> Result<bool, StoreError>;

    async fn count(&self, user_id: &str) -> Result<u64, StoreError>;

    /// Joined with the catalog, newest first, dangling entries dropped.
    async fn list(&self, user_id: &str) -> Result<Vec<WishlistItem>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates the user on first call, otherwise records a login.
    /// The flag is `true` when a row was created.
    async fn register(&self, registration: Registration) -> Result<(User, bool), StoreError>;

    async fn get(&self, uid: &str) -> Result<Option<User>, StoreError>;

    async fn update_profile(&self, uid: &str, patch: ProfilePatch) -> Result<User, StoreError>;

    async fn set_role(&self, uid: &str, role: Role) -> Result<User, StoreError>;

    async fn list(&self, role: Option<Role>) -> Result<Vec<User>, StoreError>;

    async fn delete(&self, uid: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn list_for_email(&self, email: &str) -> Result<Vec<Order>, StoreError>;
}

pub(crate) fn require_item(input: LineItemInput) -> Result<LineItem, StoreError> {
    input.validate().ok_or_else(|| {
        StoreError::InvalidArgument("Invalid cart item. Must have key, productId, and qty".to_string())
    })
}

pub(crate) fn require_quantity(qty: i64) -> Result<u32, StoreError> {
    u32::try_from(qty).map_err(|_| StoreError::InvalidArgument("Invalid quantity".to_string()))
}

/// Product ids are stored in canonical hyphenated lower-case form; anything
/// that is not a UUID cannot name a product.
pub(crate) fn canonical_product_id(raw: &str) -> Option<Uuid> { Uuid::parse_str(raw.trim()).ok() }

pub(crate) fn cart_not_found() -> StoreError { StoreError::NotFound("Cart not found".to_string()) }

pub(crate) fn product_not_found() -> StoreError { StoreError::NotFound("Product not found".to_string()) }

pub(crate) fn user_not_found() -> StoreError { StoreError::NotFound("User not found".to_string()) }
