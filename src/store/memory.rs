//! In-process store backed by DashMap.
//!
//! Every per-user mutation runs under the DashMap entry lock for that user,
//! so concurrent cart and wishlist writes for one user serialize.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    canonical_product_id, cart_not_found, product_not_found, require_item, require_quantity, user_not_found,
    CartStore, CatalogStore, OrderStore, StoreError, UserStore, WishlistStore,
};
use crate::domain::aggregates::{
    join_with_catalog, Cart, LineItem, LineItemInput, Order, Product, ProductFilter, ProfilePatch,
    Registration, Toggled, User, WishlistEntry, WishlistItem,
};
use crate::domain::value_objects::{ProductStatus, Role};

#[derive(Default)]
pub struct MemoryStore {
    products: DashMap<Uuid, Product>,
    skus: DashMap<String, Uuid>,
    carts: DashMap<String, Cart>,
    wishlists: DashMap<String, Vec<WishlistEntry>>,
    users: DashMap<String, User>,
    emails: DashMap<String, String>,
    orders: DashMap<Uuid, Order>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn insert_order(&self, order: Order) { self.orders.insert(order.id, order); }

    fn mutate_cart<T>(
        &self,
        user_id: &str,
        create: bool,
        f: impl FnOnce(&mut Cart) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if create {
            let mut cart = self.carts.entry(user_id.to_string()).or_insert_with(|| Cart::new(user_id));
            f(&mut cart)
        } else {
            let mut cart = self.carts.get_mut(user_id).ok_or_else(cart_not_found)?;
            f(&mut cart)
        }
    }

}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> =
            self.products.iter().filter(|p| p.matches(filter)).map(|p| p.value().clone()).collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn get(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let Ok(id) = Uuid::parse_str(id) else { return Ok(None) };
        Ok(self.products.get(&id).map(|p| p.value().clone()))
    }

    async fn insert(&self, product: Product) -> Result<Product, StoreError> {
        match self.skus.entry(product.sku.as_str().to_string()) {
            Entry::Occupied(_) => Err(StoreError::Conflict("Product with this SKU already exists".to_string())),
            Entry::Vacant(slot) => {
                slot.insert(product.id);
                self.products.insert(product.id, product.clone());
                Ok(product)
            }
        }
    }

    async fn replace(&self, id: &str, mut product: Product) -> Result<Product, StoreError> {
        let id = Uuid::parse_str(id).map_err(|_| product_not_found())?;
        let mut current = self.products.get_mut(&id).ok_or_else(product_not_found)?;
        if current.sku != product.sku {
            match self.skus.entry(product.sku.as_str().to_string()) {
                Entry::Occupied(_) => {
                    return Err(StoreError::Conflict("Product with this SKU already exists".to_string()))
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            self.skus.remove(current.sku.as_str());
        }
        product.id = id;
        product.created_at = current.created_at;
        *current = product.clone();
        Ok(product)
    }

    async fn set_status(&self, id: &str, status: ProductStatus) -> Result<Product, StoreError> {
        let id = Uuid::parse_str(id).map_err(|_| product_not_found())?;
        let mut product = self.products.get_mut(&id).ok_or_else(product_not_found)?;
        product.set_status(status);
        Ok(product.clone())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = Uuid::parse_str(id).map_err(|_| product_not_found())?;
        let (_, removed) = self.products.remove(&id).ok_or_else(product_not_found)?;
        self.skus.remove(removed.sku.as_str());
        Ok(())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn get(&self, user_id: &str) -> Result<Vec<LineItem>, StoreError> {
        Ok(self.carts.get(user_id).map(|c| c.items().to_vec()).unwrap_or_default())
    }

    async fn replace(&self, user_id: &str, items: Vec<LineItemInput>) -> Result<Vec<LineItem>, StoreError> {
        self.mutate_cart(user_id, true, |cart| Ok(cart.replace(items).to_vec()))
    }

    async fn add_item(&self, user_id: &str, item: LineItemInput) -> Result<Vec<LineItem>, StoreError> {
        let item = require_item(item)?;
        self.mutate_cart(user_id, true, |cart| {
            cart.add_item(item);
            Ok(cart.items().to_vec())
        })
    }

    async fn update_quantity(&self, user_id: &str, key: &str, qty: i64) -> Result<Vec<LineItem>, StoreError> {
        let qty = require_quantity(qty)?;
        self.mutate_cart(user_id, false, |cart| {
            cart.update_quantity(key, qty)?;
            Ok(cart.items().to_vec())
        })
    }

    async fn remove_item(&self, user_id: &str, key: &str) -> Result<Vec<LineItem>, StoreError> {
        self.mutate_cart(user_id, false, |cart| {
            cart.remove_item(key)?;
            Ok(cart.items().to_vec())
        })
        .map_err(|e| match e {
            StoreError::NotFound(_) => StoreError::NotFound("Item not found".to_string()),
            other => other,
        })
    }

    async fn clear(&self, user_id: &str) -> Result<(), StoreError> {
        self.mutate_cart(user_id, true, |cart| {
            cart.clear();
            Ok(())
        })
    }

    async fn count(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self.carts.get(user_id).map(|c| c.item_count()).unwrap_or(0))
    }
}

#[async_trait]
impl WishlistStore for MemoryStore {
    async fn toggle(&self, user_id: &str, product_id: &str) -> Result<Toggled, StoreError> {
        let id = canonical_product_id(product_id).filter(|id| self.products.contains_key(id));
        let product_id = id.ok_or_else(product_not_found)?.to_string();
        let mut entries = self.wishlists.entry(user_id.to_string()).or_default();
        match entries.iter().position(|e| e.product_id == product_id) {
            Some(index) => {
                entries.remove(index);
                Ok(Toggled::Removed)
            }
            None => {
                entries.push(WishlistEntry::new(user_id, product_id));
                Ok(Toggled::Added)
            }
        }
    }

    async fn remove(&self, user_id: &str, product_id: &str) -> Result<(), StoreError> {
        let not_found = || StoreError::NotFound("Item not found in wishlist".to_string());
        let product_id = canonical_product_id(product_id).ok_or_else(not_found)?.to_string();
        let mut entries = self.wishlists.get_mut(user_id).ok_or_else(not_found)?;
        let index = entries.iter().position(|e| e.product_id == product_id).ok_or_else(not_found)?;
        entries.remove(index);
        Ok(())
    }

    async fn is_member(&self, user_id: &str, product_id: &str) -> Result<bool, StoreError> {
        let Some(product_id) = canonical_product_id(product_id).map(|id| id.to_string()) else { return Ok(false) };
        Ok(self.wishlists.get(user_id).is_some_and(|e| e.iter().any(|e| e.product_id == product_id)))
    }

    async fn count(&self, user_id: &str) -> Result<u64, StoreError> {
        Ok(self.wishlists.get(user_id).map_or(0, |e| e.len() as u64))
    }

    async fn list(&self, user_id: &str) -> Result<Vec<WishlistItem>, StoreError> {
        let entries = self.wishlists.get(user_id).map(|e| e.value().clone()).unwrap_or_default();
        let catalog: HashMap<String, Product> = entries
            .iter()
            .filter_map(|e| Uuid::parse_str(&e.product_id).ok())
            .filter_map(|id| self.products.get(&id).map(|p| (id.to_string(), p.value().clone())))
            .collect();
        Ok(join_with_catalog(entries, &catalog))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn register(&self, registration: Registration) -> Result<(User, bool), StoreError> {
        let email = registration.email.as_str().to_string();
        let claim_email = |uid: &str| match self.emails.entry(email.clone()) {
            Entry::Occupied(owner) if owner.get() != uid => {
                Err(StoreError::Conflict("Email is already registered to another account".to_string()))
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(uid.to_string());
                Ok(())
            }
        };
        match self.users.entry(registration.uid.clone()) {
            Entry::Occupied(mut row) => {
                let previous = row.get().email.as_str().to_string();
                claim_email(&registration.uid)?;
                if previous != email {
                    self.emails.remove(&previous);
                }
                row.get_mut().record_login(registration);
                Ok((row.get().clone(), false))
            }
            Entry::Vacant(slot) => {
                claim_email(&registration.uid)?;
                let user = User::register(registration);
                slot.insert(user.clone());
                Ok((user, true))
            }
        }
    }

    async fn get(&self, uid: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(uid).map(|u| u.value().clone()))
    }

    async fn update_profile(&self, uid: &str, patch: ProfilePatch) -> Result<User, StoreError> {
        let mut user = self.users.get_mut(uid).ok_or_else(user_not_found)?;
        user.apply_profile(patch);
        Ok(user.clone())
    }

    async fn set_role(&self, uid: &str, role: Role) -> Result<User, StoreError> {
        let mut user = self.users.get_mut(uid).ok_or_else(user_not_found)?;
        user.set_role(role);
        Ok(user.clone())
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .users
            .iter()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .map(|u| u.value().clone())
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn delete(&self, uid: &str) -> Result<(), StoreError> {
        let (_, user) = self.users.remove(uid).ok_or_else(user_not_found)?;
        self.emails.remove(user.email.as_str());
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn list_for_email(&self, email: &str) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> =
            self.orders.iter().filter(|o| o.user_email == email).map(|o| o.value().clone()).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}
