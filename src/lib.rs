//! Storefront API
//!
//! REST backend for an online shop.
//!
//! ## Features
//! - Product catalog with filtered listing
//! - Per-user carts with merge-by-key line items
//! - Wishlists joined against the catalog
//! - User registration, profiles and role administration
//! - Session cookies and identity-provider bearer tokens
//! - Media cleanup on the image host

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod media;
pub mod routes;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
