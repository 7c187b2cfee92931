//! Storefront API server

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_api::auth::{FirebaseVerifier, SessionSigner};
use storefront_api::config::{Config, StoreBackend};
use storefront_api::media::Cloudinary;
use storefront_api::store::{MemoryStore, PgStore};
use storefront_api::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let sessions = SessionSigner::new(&config.jwt_secret);
    let identity = Arc::new(FirebaseVerifier::new(config.firebase_project_id.clone()));

    let state = match (config.backend, &config.database) {
        (StoreBackend::Postgres, Some(settings)) => {
            let store = PgStore::connect(settings).await.context("connecting to PostgreSQL")?;
            AppState::from_store(Arc::new(store), sessions, identity)
        }
        _ => {
            tracing::warn!("using the in-memory store; data is lost on restart");
            AppState::from_store(Arc::new(MemoryStore::new()), sessions, identity)
        }
    }
    .with_access(config.access)
    .with_secure_cookies(config.production);

    let state = match &config.cloudinary {
        Some(cloudinary) => state.with_media(Arc::new(Cloudinary::new(cloudinary))),
        None => {
            tracing::warn!("Cloudinary is not configured; media routes will fail");
            state
        }
    };

    let app = router(state, &config.allowed_origins);
    let addr = config.socket_addr();
    tracing::info!(%addr, access = ?config.access, "storefront API listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
