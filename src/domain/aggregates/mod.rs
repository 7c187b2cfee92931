//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod wishlist;
pub mod user;

pub use product::{Product, ProductError, ProductFilter, ProductInput};
pub use order::{Order, OrderStatus};
pub use cart::{Cart, CartError, LineItem, LineItemInput};
pub use wishlist::{join_with_catalog, Toggled, WishlistEntry, WishlistItem};
pub use user::{Address, ProfilePatch, Registration, User};
