//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_ACCESS_SECRET` - HS256 secret for the `access_token` session cookie
//! - `FIREBASE_SERVICE_KEY` - base64 of the service-account JSON (see `encode-service-key`)
//! - `DATABASE_URL`, or `DB_USER` + `DB_PASS` + `DB_HOST` - only with the postgres backend
//!
//! ## Optional
//! - `DB_NAME` - database name when the URL is assembled (default: ecommerce)
//! - `STORE_BACKEND` - `postgres` or `memory` (default: postgres)
//! - `HOST` / `PORT` - bind address (default: 0.0.0.0:5000)
//! - `ALLOWED_ORIGINS` - comma-separated CORS origins (default: http://localhost:5173)
//! - `APP_ENV` - `production` marks the session cookie `Secure`
//! - `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET`
//! - `WISHLIST_AUTH` - wishlist routes require credentials (default: true)
//! - `ROLE_GATING` - user administration requires admin/staff role (default: true)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::store::postgres::PoolSettings;

const DEFAULT_DB_NAME: &str = "ecommerce";
const DEFAULT_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Per-deployment switches for the credential gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessFlags {
    pub wishlist_auth: bool,
    pub role_gating: bool,
}

impl Default for AccessFlags {
    fn default() -> Self { Self { wishlist_auth: true, role_gating: true } }
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub backend: StoreBackend,
    /// Present whenever `backend` is `Postgres`.
    pub database: Option<PoolSettings>,
    pub jwt_secret: SecretString,
    pub firebase_project_id: String,
    pub cloudinary: Option<CloudinaryConfig>,
    pub allowed_origins: Vec<String>,
    pub production: bool,
    pub access: AccessFlags,
}

#[derive(Deserialize)]
struct ServiceAccount {
    project_id: String,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let host = env.or_default("HOST", "0.0.0.0").parse::<IpAddr>().map_err(|e| env.invalid("HOST", e))?;
        let port = env.or_default("PORT", "5000").parse::<u16>().map_err(|e| env.invalid("PORT", e))?;

        let backend = match env.or_default("STORE_BACKEND", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => return Err(env.invalid("STORE_BACKEND", format!("unknown backend {other:?}"))),
        };
        let database = match backend {
            StoreBackend::Postgres => Some(PoolSettings {
                url: database_url(&env)?,
                max_connections: 10,
                connect_timeout: Duration::from_secs(10),
                statement_timeout: Duration::from_secs(45),
            }),
            StoreBackend::Memory => None,
        };

        let jwt_secret = SecretString::from(env.required("JWT_ACCESS_SECRET")?);
        let firebase_project_id = project_id_from_key(&env.required("FIREBASE_SERVICE_KEY")?)
            .map_err(|e| env.invalid("FIREBASE_SERVICE_KEY", e))?;

        let cloudinary = match (
            env.optional("CLOUDINARY_CLOUD_NAME"),
            env.optional("CLOUDINARY_API_KEY"),
            env.optional("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(secret)) => {
                Some(CloudinaryConfig { cloud_name, api_key, api_secret: SecretString::from(secret) })
            }
            _ => None,
        };

        let allowed_origins = env
            .or_default("ALLOWED_ORIGINS", DEFAULT_ORIGIN)
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        let access = AccessFlags {
            wishlist_auth: env.flag("WISHLIST_AUTH", true)?,
            role_gating: env.flag("ROLE_GATING", true)?,
        };

        Ok(Self {
            host,
            port,
            backend,
            database,
            jwt_secret,
            firebase_project_id,
            cloudinary,
            allowed_origins,
            production: env.or_default("APP_ENV", "development") == "production",
            access,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> { (self.0)(key).filter(|v| !v.trim().is_empty()) }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => Ok(false),
            Some(v) => Err(self.invalid(key, format!("expected a boolean, got {v:?}"))),
        }
    }

    fn invalid(&self, key: &str, err: impl ToString) -> ConfigError {
        ConfigError::InvalidEnvVar(key.to_string(), err.to_string())
    }
}

fn database_url<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<SecretString, ConfigError> {
    if let Some(url) = env.optional("DATABASE_URL") {
        return Ok(SecretString::from(url));
    }
    let user = env.required("DB_USER")?;
    let pass = env.required("DB_PASS")?;
    let host = env.required("DB_HOST")?;
    let name = env.or_default("DB_NAME", DEFAULT_DB_NAME);
    Ok(SecretString::from(format!("postgres://{user}:{pass}@{host}/{name}")))
}

/// Decodes the base64 service-account key and returns its `project_id`.
pub fn project_id_from_key(encoded: &str) -> Result<String, String> {
    let raw = STANDARD.decode(encoded.trim()).map_err(|e| format!("not base64: {e}"))?;
    let account: ServiceAccount = serde_json::from_slice(&raw).map_err(|e| format!("not a service-account key: {e}"))?;
    if account.project_id.is_empty() {
        return Err("project_id is empty".to_string());
    }
    Ok(account.project_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn service_key() -> String { STANDARD.encode(r#"{"type":"service_account","project_id":"abaiya-shop"}"#) }

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults_with_memory_backend() {
        let key = service_key();
        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_ACCESS_SECRET", "s3cr3t"),
            ("FIREBASE_SERVICE_KEY", &key),
        ])
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert!(config.database.is_none());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5000");
        assert_eq!(config.allowed_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(config.firebase_project_id, "abaiya-shop");
        assert_eq!(config.access, AccessFlags::default());
        assert!(config.cloudinary.is_none());
        assert!(!config.production);
    }

    #[test]
    fn test_database_url_assembled_from_parts() {
        let key = service_key();
        let config = load(&[
            ("DB_USER", "shop"),
            ("DB_PASS", "pw"),
            ("DB_HOST", "db.internal:5432"),
            ("JWT_ACCESS_SECRET", "s3cr3t"),
            ("FIREBASE_SERVICE_KEY", &key),
        ])
        .unwrap();
        let db = config.database.unwrap();
        assert_eq!(db.url.expose_secret(), "postgres://shop:pw@db.internal:5432/ecommerce");
        assert_eq!(db.max_connections, 10);
    }

    #[test]
    fn test_missing_database_is_reported() {
        let key = service_key();
        let err = load(&[("JWT_ACCESS_SECRET", "s3cr3t"), ("FIREBASE_SERVICE_KEY", &key)]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "DB_USER"));
    }

    #[test]
    fn test_flags_and_origins() {
        let key = service_key();
        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_ACCESS_SECRET", "s3cr3t"),
            ("FIREBASE_SERVICE_KEY", &key),
            ("WISHLIST_AUTH", "off"),
            ("ALLOWED_ORIGINS", "https://shop.example, http://localhost:5173 ,"),
            ("APP_ENV", "production"),
        ])
        .unwrap();
        assert!(!config.access.wishlist_auth);
        assert!(config.access.role_gating);
        assert_eq!(config.allowed_origins.len(), 2);
        assert!(config.production);
    }

    #[test]
    fn test_bad_flag_and_bad_key() {
        let key = service_key();
        let err = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_ACCESS_SECRET", "s3cr3t"),
            ("FIREBASE_SERVICE_KEY", &key),
            ("ROLE_GATING", "maybe"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "ROLE_GATING"));

        assert!(project_id_from_key("%%%").is_err());
        assert!(project_id_from_key(&STANDARD.encode("{}")).is_err());
    }
}
