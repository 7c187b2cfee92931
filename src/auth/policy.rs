//! Declarative per-route access rules.
//!
//! A route group carries one `RoutePolicy`; `enforce` evaluates it before the
//! handler runs and leaves a `Caller` in the request extensions.

use std::collections::HashMap;

use axum::extract::{Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::session::token_from_cookies;
use super::{AuthError, SessionClaims, VerifiedIdentity};
use crate::domain::value_objects::Role;
use crate::error::ApiError;
use crate::state::AppState;

pub const ADMIN: &[Role] = &[Role::Admin];
pub const ADMIN_OR_STAFF: &[Role] = &[Role::Admin, Role::Staff];

/// Path parameter compared against the caller's email.
const PATH_USER_PARAM: &str = "userId";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    None,
    Session,
    Bearer,
    Both,
}

impl Channel {
    fn uses_session(self) -> bool { matches!(self, Self::Session | Self::Both) }
    fn uses_bearer(self) -> bool { matches!(self, Self::Bearer | Self::Both) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoutePolicy {
    pub channel: Channel,
    /// Role allow-list, checked against the stored user of the bearer subject.
    pub roles: Option<&'static [Role]>,
    pub match_path_user: bool,
}

impl RoutePolicy {
    pub const OPEN: Self = Self::new(Channel::None);

    pub const fn new(channel: Channel) -> Self { Self { channel, roles: None, match_path_user: false } }

    pub const fn with_roles(self, roles: &'static [Role]) -> Self { Self { roles: Some(roles), ..self } }

    pub const fn own_path(self) -> Self { Self { match_path_user: true, ..self } }
}

/// Who is calling, as far as the route policy needed to find out.
#[derive(Clone, Debug, Default)]
pub struct Caller {
    pub session: Option<SessionClaims>,
    pub identity: Option<VerifiedIdentity>,
    pub role: Option<Role>,
}

impl Caller {
    pub fn identity(&self) -> Result<&VerifiedIdentity, ApiError> {
        self.identity.as_ref().ok_or_else(|| ApiError::from(AuthError::MissingToken))
    }
}

#[derive(Clone)]
pub struct Guard {
    state: AppState,
    policy: RoutePolicy,
}

impl Guard {
    pub fn new(state: &AppState, policy: RoutePolicy) -> Self { Self { state: state.clone(), policy } }
}

pub async fn enforce(
    State(guard): State<Guard>,
    path: Option<Path<HashMap<String, String>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path_user = path.as_ref().and_then(|Path(params)| params.get(PATH_USER_PARAM).cloned());
    let outcome = authorize(&guard.state, guard.policy, request.headers(), path_user.as_deref()).await;
    match outcome {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(err) => {
            tracing::debug!(path = %request.uri().path(), error = %err, "access denied");
            err.into_response()
        }
    }
}

pub async fn authorize(
    state: &AppState,
    policy: RoutePolicy,
    headers: &HeaderMap,
    path_user: Option<&str>,
) -> Result<Caller, ApiError> {
    let mut caller = Caller::default();

    if policy.channel.uses_session() {
        let token = token_from_cookies(headers).ok_or(AuthError::MissingToken)?;
        caller.session = Some(state.sessions.verify(&token)?);
    }
    if policy.channel.uses_bearer() {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        caller.identity = Some(state.identity.verify(token).await?);
    }

    if policy.match_path_user {
        let user = path_user.unwrap_or_default();
        // Exact match: the path value is the storage key.
        let session_ok = caller.session.as_ref().map_or(true, |s| s.email == user);
        let bearer_ok = caller.identity.as_ref().map_or(true, |i| i.email.as_str() == user);
        if !(session_ok && bearer_ok) {
            return Err(ApiError::Forbidden("Forbidden access: User ID does not match token".to_string()));
        }
    }

    if let Some(allowed) = policy.roles {
        let identity = caller.identity()?;
        let user = state
            .users
            .get(&identity.subject)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
        if !user.has_role(allowed) {
            return Err(ApiError::Forbidden("Forbidden access: insufficient role".to_string()));
        }
        caller.role = Some(user.role);
    }

    Ok(caller)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
