//! User Aggregate
//!
//! Keyed by the identity provider's subject id. Created on the first
//! registration call, refreshed on every later login.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::domain::value_objects::{Email, Role};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[validate(length(max = 200))]
    pub street1: Option<String>,
    #[validate(length(max = 200))]
    pub street2: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    #[validate(length(max = 20))]
    pub zip: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: Email,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<Address>,
    #[serde(default)]
    pub preferences: Map<String, Value>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

/// Identity facts taken from a verified bearer token plus the optional body.
#[derive(Clone, Debug)]
pub struct Registration {
    pub uid: String,
    pub email: Email,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

impl User {
    pub fn register(reg: Registration) -> Self {
        let now = Utc::now();
        Self {
            uid: reg.uid,
            email: reg.email,
            display_name: reg.display_name,
            photo_url: reg.photo_url,
            role: Role::default(),
            phone: None,
            address: None,
            preferences: Map::new(),
            email_verified: reg.email_verified,
            created_at: now,
            updated_at: now,
            last_login_at: now,
        }
    }

    /// Refreshes login metadata. Role and profile fields are left alone.
    pub fn record_login(&mut self, reg: Registration) {
        self.email = reg.email;
        self.email_verified = reg.email_verified;
        if reg.display_name.is_some() { self.display_name = reg.display_name; }
        if reg.photo_url.is_some() { self.photo_url = reg.photo_url; }
        let now = Utc::now();
        self.last_login_at = now;
        self.updated_at = now;
    }

    pub fn apply_profile(&mut self, patch: ProfilePatch) {
        if let Some(v) = patch.display_name { self.display_name = Some(v); }
        if let Some(v) = patch.photo_url { self.photo_url = Some(v); }
        if let Some(v) = patch.phone { self.phone = Some(v); }
        if let Some(v) = patch.address { self.address = Some(v); }
        if let Some(prefs) = patch.preferences {
            self.preferences.extend(prefs);
        }
        self.updated_at = Utc::now();
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.updated_at = Utc::now();
    }

    pub fn has_role(&self, allowed: &[Role]) -> bool { allowed.contains(&self.role) }
}

/// Partial profile update; absent fields are untouched.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfilePatch {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    #[validate(url)]
    pub photo_url: Option<String>,
    #[validate(length(min = 5, max = 32))]
    pub phone: Option<String>,
    #[validate]
    pub address: Option<Address>,
    pub preferences: Option<Map<String, Value>>,
}
