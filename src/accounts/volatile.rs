use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::warn;

use super::{
    model::{normalize_email, Account, AccountDraft, AccountId, AccountPatch, Preferences, Role},
    store::{Backend, StoreError, UserStore},
};
use crate::auth::password::PasswordHasher;

/// In-process fallback store. Contents live only as long as the process.
pub struct VolatileStore {
    accounts: RwLock<HashMap<u64, Account>>,
    next_id: AtomicU64,
    hasher: PasswordHasher,
}

impl VolatileStore {
    pub fn new(hasher: PasswordHasher) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            hasher,
        }
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    fn key(id: &AccountId) -> Option<u64> {
        id.as_str().parse().ok()
    }

    fn email_taken(map: &HashMap<u64, Account>, email: &str, except: Option<u64>) -> bool {
        map.iter()
            .any(|(k, a)| Some(*k) != except && a.email == email)
    }
}

#[async_trait]
impl UserStore for VolatileStore {
    fn backend(&self) -> Backend {
        Backend::Volatile
    }

    async fn create(&self, draft: AccountDraft) -> Result<Account, StoreError> {
        let email = normalize_email(&draft.email);
        if Self::email_taken(&*self.accounts.read().await, &email, None) {
            return Err(StoreError::DuplicateEmail);
        }

        let password_hash = self.hasher.hash_blocking(draft.password).await?;

        let mut map = self.accounts.write().await;
        // Re-check under the write lock: a concurrent create may have won
        // while we were hashing.
        if Self::email_taken(&map, &email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        let key = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = OffsetDateTime::now_utc();
        let account = Account {
            id: AccountId::from(key.to_string()),
            email,
            password_hash,
            first_name: draft.first_name,
            last_name: draft.last_name,
            role: Role::User,
            is_active: true,
            favorite_article_ids: Vec::new(),
            preferences: Preferences::default(),
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        map.insert(key, account.clone());
        warn!(
            account_id = %account.id,
            "account written to volatile store; it will be lost on restart"
        );
        Ok(account)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let email = normalize_email(email);
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        let Some(key) = Self::key(id) else {
            return Ok(None);
        };
        Ok(self.accounts.read().await.get(&key).cloned())
    }

    async fn update(&self, id: &AccountId, patch: AccountPatch) -> Result<Account, StoreError> {
        let key = Self::key(id).ok_or(StoreError::NotFound)?;
        let mut map = self.accounts.write().await;
        if let Some(email) = patch.email.as_deref() {
            if Self::email_taken(&map, &normalize_email(email), Some(key)) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        let account = map.get_mut(&key).ok_or(StoreError::NotFound)?;
        account.apply(patch, OffsetDateTime::now_utc());
        Ok(account.clone())
    }

    async fn record_login(&self, id: &AccountId) -> Result<Account, StoreError> {
        let key = Self::key(id).ok_or(StoreError::NotFound)?;
        let mut map = self.accounts.write().await;
        let account = map.get_mut(&key).ok_or(StoreError::NotFound)?;
        let now = OffsetDateTime::now_utc();
        account.last_login_at = Some(now);
        account.updated_at = now;
        Ok(account.clone())
    }
}
