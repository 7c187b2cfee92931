use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::guarded;
use crate::auth::policy::{ADMIN, ADMIN_OR_STAFF};
use crate::auth::{Caller, Channel, RoutePolicy};
use crate::domain::aggregates::{ProfilePatch, Registration};
use crate::domain::value_objects::Role;
use crate::error::{ApiError, AppJson, AppQuery};
use crate::state::AppState;

const SIGNED_IN: RoutePolicy = RoutePolicy::new(Channel::Bearer);

pub(super) fn routes(state: &AppState) -> Router<AppState> {
    let (staff, admin) = if state.access.role_gating {
        (SIGNED_IN.with_roles(ADMIN_OR_STAFF), SIGNED_IN.with_roles(ADMIN))
    } else {
        (SIGNED_IN, SIGNED_IN)
    };

    let own = Router::new()
        .route("/api/users/register", post(register))
        .route("/api/users/profile", get(profile).patch(update_profile));
    let listing = Router::new().route("/api/users", get(list_users));
    let administration = Router::new()
        .route("/api/users/:id/role", patch(set_role))
        .route("/api/users/:id", delete(delete_user));

    guarded(own, state, SIGNED_IN)
        .merge(guarded(listing, state, staff))
        .merge(guarded(administration, state, admin))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Option<AppJson<RegisterBody>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let identity = caller.identity()?;
    let body = body.map(|AppJson(b)| b).unwrap_or_default();
    let registration = Registration {
        uid: identity.subject.clone(),
        email: identity.email.clone(),
        email_verified: identity.email_verified,
        display_name: body.display_name.filter(|n| !n.trim().is_empty()),
        photo_url: body.photo_url.filter(|p| !p.trim().is_empty()),
    };
    let (user, created) = state.users.register(registration).await?;
    let (status, message) = if created {
        (StatusCode::CREATED, "User registered successfully")
    } else {
        (StatusCode::OK, "User updated successfully")
    };
    Ok((status, Json(json!({"success": true, "message": message, "user": user}))))
}

async fn profile(State(state): State<AppState>, Extension(caller): Extension<Caller>) -> Result<Json<Value>, ApiError> {
    let identity = caller.identity()?;
    let user = state.users.get(&identity.subject).await?.ok_or_else(user_not_found)?;
    let orders = match state.orders.list_for_email(user.email.as_str()).await {
        Ok(orders) => orders,
        Err(e) => {
            tracing::warn!(uid = %user.uid, error = %e, "orders unavailable for profile");
            Vec::new()
        }
    };
    Ok(Json(json!({"success": true, "user": user, "orders": orders})))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    AppJson(patch): AppJson<ProfilePatch>,
) -> Result<Json<Value>, ApiError> {
    patch.validate().map_err(|e| ApiError::InvalidArgument(e.to_string()))?;
    let identity = caller.identity()?;
    let user = state.users.update_profile(&identity.subject, patch).await?;
    Ok(Json(json!({"success": true, "message": "Profile updated successfully", "user": user})))
}

#[derive(Debug, Deserialize)]
struct RoleQuery {
    role: Option<String>,
}

async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<RoleQuery>,
) -> Result<Json<Value>, ApiError> {
    let role = query.role.filter(|r| !r.is_empty()).map(|r| parse_role(&r)).transpose()?;
    let users = state.users.list(role).await?;
    Ok(Json(json!({"success": true, "count": users.len(), "users": users})))
}

#[derive(Debug, Deserialize)]
struct RoleBody {
    #[serde(default)]
    role: Option<String>,
}

async fn set_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(uid): Path<String>,
    AppJson(body): AppJson<RoleBody>,
) -> Result<Json<Value>, ApiError> {
    let role = parse_role(body.role.as_deref().unwrap_or_default())?;
    let user = state.users.set_role(&uid, role).await?;
    let by = caller.identity.as_ref().map(|i| i.subject.as_str()).unwrap_or_default();
    tracing::info!(%uid, %role, by, "role updated");
    Ok(Json(json!({"success": true, "message": "User role updated successfully", "user": user})))
}

async fn delete_user(State(state): State<AppState>, Path(uid): Path<String>) -> Result<Json<Value>, ApiError> {
    state.users.delete(&uid).await?;
    Ok(Json(json!({"success": true, "message": "User deleted successfully"})))
}

fn parse_role(value: &str) -> Result<Role, ApiError> {
    value.parse::<Role>().map_err(|_| ApiError::InvalidArgument("Invalid role".to_string()))
}

fn user_not_found() -> ApiError { ApiError::NotFound("User not found".to_string()) }
