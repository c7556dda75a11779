use async_trait::async_trait;
use thiserror::Error;

use super::model::{Account, AccountDraft, AccountId, AccountPatch};
use crate::auth::password::PasswordError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("account not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Hash(#[from] PasswordError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Which implementation served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Durable,
    Volatile,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Durable => "durable",
            Backend::Volatile => "volatile",
        }
    }
}

/// Account persistence contract shared by both backends.
#[async_trait]
pub trait UserStore: Send + Sync {
    fn backend(&self) -> Backend;

    /// Hashes `draft.password`, rejects a taken (normalized) email, and
    /// stores a fresh account with default role, preferences and timestamps.
    async fn create(&self, draft: AccountDraft) -> Result<Account, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, StoreError>;

    /// Merges `patch` and refreshes `updated_at`. Changing the email to one
    /// owned by another account fails with `DuplicateEmail`.
    async fn update(&self, id: &AccountId, patch: AccountPatch) -> Result<Account, StoreError>;

    /// Sets `last_login_at` and `updated_at` to now.
    async fn record_login(&self, id: &AccountId) -> Result<Account, StoreError>;
}
