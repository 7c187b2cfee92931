//! Bearer channel backed by Firebase Authentication.
//!
//! ID tokens are RS256 JWTs signed with Google's rotating keys. The key set
//! is fetched from the securetoken JWKS endpoint and cached for as long as
//! its `Cache-Control: max-age` allows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use moka::Expiry;
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;

use super::AuthError;
use crate::domain::value_objects::Email;

const JWKS_URL: &str = "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(60 * 60);

/// Identity facts carried by a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub email: Email,
    pub email_verified: bool,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

impl TryFrom<IdTokenClaims> for VerifiedIdentity {
    type Error = AuthError;

    fn try_from(claims: IdTokenClaims) -> Result<Self, Self::Error> {
        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }
        let email = claims
            .email
            .as_deref()
            .ok_or_else(|| AuthError::InvalidToken("token carries no email".to_string()))
            .and_then(|e| Email::parse(e).map_err(|err| AuthError::InvalidToken(err.to_string())))?;
        Ok(Self { subject: claims.sub, email, email_verified: claims.email_verified })
    }
}

#[derive(Clone)]
struct SigningKeys {
    keys: Arc<HashMap<String, DecodingKey>>,
    ttl: Duration,
}

struct KeyExpiry;

impl Expiry<(), SigningKeys> for KeyExpiry {
    fn expire_after_create(&self, _key: &(), value: &SigningKeys, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }
}

pub struct FirebaseVerifier {
    project_id: String,
    http: reqwest::Client,
    keys: Cache<(), SigningKeys>,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            http: reqwest::Client::new(),
            keys: Cache::builder().max_capacity(1).expire_after(KeyExpiry).build(),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);
        validation
    }

    async fn fetch_keys(&self) -> Result<SigningKeys, AuthError> {
        let response = self
            .http
            .get(JWKS_URL)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .unwrap_or(DEFAULT_KEY_TTL);
        let set: JwkSet = response.json().await.map_err(|e| AuthError::Provider(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else { continue };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => tracing::warn!(%kid, error = %e, "skipping unusable signing key"),
            }
        }
        tracing::debug!(keys = keys.len(), ttl_secs = ttl.as_secs(), "identity provider keys refreshed");
        Ok(SigningKeys { keys: Arc::new(keys), ttl })
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let header = decode_header(token)?;
        let kid = header.kid.ok_or_else(|| AuthError::InvalidToken("missing key id".to_string()))?;
        let keys = self
            .keys
            .try_get_with((), self.fetch_keys())
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        let key = keys.keys.get(&kid).ok_or_else(|| AuthError::InvalidToken(format!("unknown key id {kid}")))?;
        let data = decode::<IdTokenClaims>(token, key, &self.validation())?;
        VerifiedIdentity::try_from(data.claims)
    }
}

/// `max-age` from a `Cache-Control` value.
fn max_age(header: &str) -> Option<Duration> {
    header
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
