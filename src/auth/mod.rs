//! Credential channels and route policies.
//!
//! - `session` - HS256 `access_token` cookie signed by this service
//! - `firebase` - identity-provider bearer tokens (RS256, JWKS)
//! - `policy` - per-route requirements and the middleware that enforces them

pub mod firebase;
pub mod policy;
pub mod session;

use thiserror::Error;

pub use firebase::{FirebaseVerifier, IdentityVerifier, VerifiedIdentity};
pub use policy::{Caller, Channel, RoutePolicy};
pub use session::{SessionClaims, SessionSigner};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized access, token missing")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Identity provider error: {0}")]
    Provider(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self { AuthError::InvalidToken(err.to_string()) }
}
