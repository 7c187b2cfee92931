use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, Transaction};

use super::{conflict_on_unique, PgStore};
use crate::domain::aggregates::{Address, ProfilePatch, Registration, User};
use crate::domain::value_objects::{Email, Role};
use crate::store::{user_not_found, StoreError, UserStore};

const EMAIL_TAKEN: &str = "Email is already registered to another account";

const COLUMNS: &str = "uid, email, display_name, photo_url, role, phone, address, preferences, \
                       email_verified, created_at, updated_at, last_login_at";

#[derive(Debug, FromRow)]
struct UserRow {
    uid: String,
    email: String,
    display_name: Option<String>,
    photo_url: Option<String>,
    role: String,
    phone: Option<String>,
    address: Option<Json<Address>>,
    preferences: Json<Map<String, Value>>,
    email_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| StoreError::DataCorruption(format!("user {}: {what}", row.uid));
        let email = Email::parse(&row.email).map_err(|e| corrupt(e.to_string()))?;
        let role = row.role.parse::<Role>().map_err(|e| corrupt(e.to_string()))?;
        Ok(User {
            uid: row.uid,
            email,
            display_name: row.display_name,
            photo_url: row.photo_url,
            role,
            phone: row.phone,
            address: row.address.map(|a| a.0),
            preferences: row.preferences.0,
            email_verified: row.email_verified,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
        })
    }
}

async fn lock_user(tx: &mut Transaction<'_, Postgres>, uid: &str) -> Result<Option<User>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE uid = $1 FOR UPDATE"))
        .bind(uid)
        .fetch_optional(&mut **tx)
        .await?;
    row.map(User::try_from).transpose()
}

async fn save_user(tx: &mut Transaction<'_, Postgres>, user: &User) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE users SET email = $2, display_name = $3, photo_url = $4, role = $5, phone = $6, address = $7, \
         preferences = $8, email_verified = $9, updated_at = $10, last_login_at = $11 WHERE uid = $1",
    )
    .bind(&user.uid)
    .bind(user.email.as_str())
    .bind(&user.display_name)
    .bind(&user.photo_url)
    .bind(user.role.as_str())
    .bind(&user.phone)
    .bind(user.address.as_ref().map(Json))
    .bind(Json(&user.preferences))
    .bind(user.email_verified)
    .bind(user.updated_at)
    .bind(user.last_login_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| conflict_on_unique(e, EMAIL_TAKEN))?;
    Ok(())
}

impl PgStore {
    /// Loads the user under a row lock, applies `f` and writes it back.
    async fn with_locked_user<F>(&self, uid: &str, f: F) -> Result<User, StoreError>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut tx = self.pool.begin().await?;
        let mut user = lock_user(&mut tx, uid).await?.ok_or_else(user_not_found)?;
        f(&mut user);
        save_user(&mut tx, &user).await?;
        tx.commit().await?;
        Ok(user)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn register(&self, registration: Registration) -> Result<(User, bool), StoreError> {
        let mut tx = self.pool.begin().await?;
        if let Some(mut user) = lock_user(&mut tx, &registration.uid).await? {
            user.record_login(registration);
            save_user(&mut tx, &user).await?;
            tx.commit().await?;
            tracing::debug!(uid = %user.uid, "login recorded");
            return Ok((user, false));
        }

        let user = User::register(registration.clone());
        let inserted = sqlx::query(
            "INSERT INTO users (uid, email, display_name, photo_url, role, preferences, email_verified, \
             created_at, updated_at, last_login_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (uid) DO NOTHING",
        )
        .bind(&user.uid)
        .bind(user.email.as_str())
        .bind(&user.display_name)
        .bind(&user.photo_url)
        .bind(user.role.as_str())
        .bind(Json(&user.preferences))
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, EMAIL_TAKEN))?
        .rows_affected();
        tx.commit().await?;

        if inserted == 0 {
            // Lost the race against a concurrent first login.
            let user = self.with_locked_user(&user.uid, move |u| u.record_login(registration)).await?;
            return Ok((user, false));
        }
        tracing::info!(uid = %user.uid, "user registered");
        Ok((user, true))
    }

    async fn get(&self, uid: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE uid = $1"))
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_profile(&self, uid: &str, patch: ProfilePatch) -> Result<User, StoreError> {
        self.with_locked_user(uid, move |user| user.apply_profile(patch)).await
    }

    async fn set_role(&self, uid: &str, role: Role) -> Result<User, StoreError> {
        let user = self.with_locked_user(uid, move |user| user.set_role(role)).await?;
        tracing::info!(uid, role = %role, "role changed");
        Ok(user)
    }

    async fn list(&self, role: Option<Role>) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE $1::text IS NULL OR role = $1 ORDER BY created_at DESC"
        ))
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn delete(&self, uid: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE uid = $1").bind(uid).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(user_not_found());
        }
        tracing::info!(uid, "user deleted");
        Ok(())
    }
}
