use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Opaque account identifier. Numeric under the volatile store, a UUID under
/// the durable one; callers only ever compare and display it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub newsletter: bool,
    pub notifications: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            newsletter: true,
            notifications: true,
        }
    }
}

/// Stored account record.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_active: bool,
    pub favorite_article_ids: Vec<i64>,
    pub preferences: Preferences,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_login_at: Option<OffsetDateTime>,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Applies the set fields of `patch`. Favorites are deduplicated keeping
    /// first-seen order.
    pub(crate) fn apply(&mut self, patch: AccountPatch, now: OffsetDateTime) {
        if let Some(email) = patch.email {
            self.email = normalize_email(&email);
        }
        if let Some(first_name) = patch.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            self.last_name = last_name;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(preferences) = patch.preferences {
            self.preferences = preferences;
        }
        if let Some(favorites) = patch.favorite_article_ids {
            self.favorite_article_ids = dedup_favorites(favorites);
        }
        self.updated_at = now;
    }
}

/// Input to `UserStore::create`; `password` is plaintext and is hashed by the
/// store before anything is persisted.
#[derive(Debug, Clone)]
pub struct AccountDraft {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub preferences: Option<Preferences>,
    pub favorite_article_ids: Option<Vec<i64>>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
            && self.preferences.is_none()
            && self.favorite_article_ids.is_none()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn dedup_favorites(ids: Vec<i64>) -> Vec<i64> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Outward view of an account. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: AccountId,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub preferences: Preferences,
    pub favorite_articles: Vec<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Account> for AccountView {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id.clone(),
            first_name: a.first_name.clone(),
            last_name: a.last_name.clone(),
            full_name: a.full_name(),
            email: a.email.clone(),
            role: a.role,
            is_active: a.is_active,
            last_login: a.last_login_at,
            preferences: a.preferences,
            favorite_articles: a.favorite_article_ids.clone(),
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Account {
        let now = OffsetDateTime::now_utc();
        Account {
            id: AccountId::from("1"),
            email: "ada@example.com".into(),
            password_hash: "$argon2id$stub".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            role: Role::User,
            is_active: true,
            favorite_article_ids: vec![],
            preferences: Preferences::default(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn full_name_is_derived() {
        let mut a = sample();
        assert_eq!(a.full_name(), "Ada Lovelace");
        a.first_name = "Augusta".into();
        assert_eq!(a.full_name(), "Augusta Lovelace");
    }

    #[test]
    fn apply_merges_only_set_fields_and_bumps_updated_at() {
        let mut a = sample();
        let later = a.updated_at + time::Duration::seconds(5);
        a.apply(
            AccountPatch {
                email: Some("  ADA@Example.COM ".into()),
                favorite_article_ids: Some(vec![3, 1, 3, 2, 1]),
                ..Default::default()
            },
            later,
        );
        assert_eq!(a.email, "ada@example.com");
        assert_eq!(a.first_name, "Ada");
        assert_eq!(a.favorite_article_ids, vec![3, 1, 2]);
        assert_eq!(a.updated_at, later);
    }

    #[test]
    fn view_excludes_password_hash() {
        let json = serde_json::to_value(AccountView::from(&sample())).unwrap();
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["role"], "user");
        assert_eq!(json["lastLogin"], serde_json::Value::Null);
        assert!(json.get("passwordHash").is_none());
        assert!(!json.to_string().contains("argon2"));
    }
}
