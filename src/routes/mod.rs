//! HTTP surface.
//!
//! Each submodule returns a `Router<AppState>` for one resource; guarded
//! groups carry their `RoutePolicy` as a route layer.

mod cart;
mod media;
mod products;
mod session;
mod users;
mod wishlist;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::policy::{enforce, Guard};
use crate::auth::RoutePolicy;
use crate::state::AppState;

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(|| async { "Storefront API is running" }))
        .route("/health", get(health))
        .merge(session::routes())
        .merge(products::routes())
        .merge(cart::routes())
        .merge(wishlist::routes(&state))
        .merge(users::routes(&state))
        .merge(media::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors(allowed_origins))
        .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({"status": "healthy", "service": "storefront-api"})) }

/// Attaches `policy` to every route of `routes`; open policies add nothing.
fn guarded(routes: Router<AppState>, state: &AppState, policy: RoutePolicy) -> Router<AppState> {
    if policy == RoutePolicy::OPEN {
        return routes;
    }
    routes.route_layer(from_fn_with_state(Guard::new(state, policy), enforce))
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}
