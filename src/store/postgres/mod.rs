//! PostgreSQL store.
//!
//! # Tables
//!
//! - `products` - catalog, unique `sku`
//! - `carts` - one row per cart owner, ordered `items` JSONB array
//! - `wishlists` - membership rows, unique `(user_id, product_id)`
//! - `users` - identity-provider subjects with role and profile
//! - `orders` - read-only here, listed on the profile page
//!
//! Multi-step mutations run inside a transaction holding a row lock on the
//! owning document.

mod cart;
mod catalog;
mod orders;
mod users;
mod wishlist;

use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

use super::StoreError;

/// Pool settings taken from configuration.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: SecretString,
    pub max_connections: u32,
    pub connect_timeout: Duration,
    pub statement_timeout: Duration,
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Connects and applies the embedded migrations.
    pub async fn connect(settings: &PoolSettings) -> Result<Self, sqlx::Error> {
        let options = PgConnectOptions::from_str(settings.url.expose_secret())?
            .options([("statement_timeout", format!("{}ms", settings.statement_timeout.as_millis()))]);
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database connected, migrations applied");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool { &self.pool }
}

/// Maps a unique-constraint violation to `Conflict`, anything else to `Database`.
fn conflict_on_unique(err: sqlx::Error, message: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(message.to_string()),
        _ => StoreError::Database(err),
    }
}
