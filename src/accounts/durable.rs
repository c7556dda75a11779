use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{error, warn};
use uuid::Uuid;

use super::{
    model::{normalize_email, Account, AccountDraft, AccountId, AccountPatch, Preferences, Role},
    store::{Backend, StoreError, UserStore},
};
use crate::{auth::password::PasswordHasher, db::Connectivity};

/// Row shape of the `accounts` table.
#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    is_active: bool,
    favorite_article_ids: Vec<i64>,
    newsletter: bool,
    notifications: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    last_login_at: Option<OffsetDateTime>,
}

impl From<AccountRow> for Account {
    fn from(r: AccountRow) -> Self {
        Self {
            id: AccountId::from(r.id.to_string()),
            email: r.email,
            password_hash: r.password_hash,
            first_name: r.first_name,
            last_name: r.last_name,
            role: Role::parse(&r.role).unwrap_or_default(),
            is_active: r.is_active,
            favorite_article_ids: r.favorite_article_ids,
            preferences: Preferences {
                newsletter: r.newsletter,
                notifications: r.notifications,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
            last_login_at: r.last_login_at,
        }
    }
}

const COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, is_active, \
     favorite_article_ids, newsletter, notifications, created_at, updated_at, last_login_at";

/// PostgreSQL-backed account store.
pub struct DurableStore {
    db: PgPool,
    hasher: PasswordHasher,
    connectivity: Connectivity,
}

impl DurableStore {
    pub fn new(db: PgPool, hasher: PasswordHasher, connectivity: Connectivity) -> Self {
        Self {
            db,
            hasher,
            connectivity,
        }
    }

    /// Maps a driver error onto the store taxonomy. Connection-class failures
    /// also flip the shared connectivity flag so the next resolution falls
    /// back immediately.
    fn classify(&self, e: sqlx::Error) -> StoreError {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => {
                if self.connectivity.mark_offline() {
                    warn!(error = %e, "durable store unreachable; falling back to volatile store");
                }
                StoreError::Unavailable(e.to_string())
            }
            other => {
                error!(error = %other, "durable store query failed");
                StoreError::Internal(other.into())
            }
        }
    }

    fn key(id: &AccountId) -> Option<Uuid> {
        Uuid::parse_str(id.as_str()).ok()
    }

    async fn fetch_by_key(&self, key: Uuid) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| self.classify(e))?;
        Ok(row.map(Account::from))
    }
}

#[async_trait]
impl UserStore for DurableStore {
    fn backend(&self) -> Backend {
        Backend::Durable
    }

    async fn create(&self, draft: AccountDraft) -> Result<Account, StoreError> {
        let email = normalize_email(&draft.email);
        if self.find_by_email(&email).await?.is_some() {
            return Err(StoreError::DuplicateEmail);
        }
        let password_hash = self.hasher.hash_blocking(draft.password).await?;
        let defaults = Preferences::default();

        // The unique index on `email` settles races the pre-check misses.
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (id, email, password_hash, first_name, last_name, role,
                                  is_active, favorite_article_ids, newsletter, notifications,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, '{{}}', $7, $8, now(), now())
            RETURNING {COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&password_hash)
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(Role::User.as_str())
        .bind(defaults.newsletter)
        .bind(defaults.notifications)
        .fetch_one(&self.db)
        .await
        .map_err(|e| self.classify(e))?;
        Ok(row.into())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await
        .map_err(|e| self.classify(e))?;
        Ok(row.map(Account::from))
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        match Self::key(id) {
            Some(key) => self.fetch_by_key(key).await,
            None => Ok(None),
        }
    }

    async fn update(&self, id: &AccountId, patch: AccountPatch) -> Result<Account, StoreError> {
        let key = Self::key(id).ok_or(StoreError::NotFound)?;
        let mut account = self.fetch_by_key(key).await?.ok_or(StoreError::NotFound)?;
        account.apply(patch, OffsetDateTime::now_utc());

        // Whole-document write; concurrent updates are last-write-wins.
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts
               SET email = $2, first_name = $3, last_name = $4, role = $5, is_active = $6,
                   favorite_article_ids = $7, newsletter = $8, notifications = $9,
                   updated_at = $10
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(key)
        .bind(&account.email)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.role.as_str())
        .bind(account.is_active)
        .bind(&account.favorite_article_ids)
        .bind(account.preferences.newsletter)
        .bind(account.preferences.notifications)
        .bind(account.updated_at)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| self.classify(e))?;
        row.map(Account::from).ok_or(StoreError::NotFound)
    }

    async fn record_login(&self, id: &AccountId) -> Result<Account, StoreError> {
        let key = Self::key(id).ok_or(StoreError::NotFound)?;
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts
               SET last_login_at = now(), updated_at = now()
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| self.classify(e))?;
        row.map(Account::from).ok_or(StoreError::NotFound)
    }
}
