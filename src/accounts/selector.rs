use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use tracing::warn;

use super::{
    durable::DurableStore,
    model::{Account, AccountDraft, AccountId, AccountPatch},
    store::{Backend, StoreError, UserStore},
    volatile::VolatileStore,
};
use crate::db::Connectivity;

/// Picks the active account store. Re-evaluated on every [`resolve`], never
/// cached, so a dropped connection takes effect on the next request.
///
/// [`resolve`]: StoreSelector::resolve
#[derive(Clone)]
pub struct StoreSelector {
    durable: Option<Arc<DurableStore>>,
    volatile: Arc<VolatileStore>,
    connectivity: Connectivity,
}

impl StoreSelector {
    pub fn new(
        durable: Option<Arc<DurableStore>>,
        volatile: Arc<VolatileStore>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            durable,
            volatile,
            connectivity,
        }
    }

    /// Selector with no durable backend configured.
    pub fn volatile_only(volatile: Arc<VolatileStore>) -> Self {
        Self::new(None, volatile, Connectivity::new(false))
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn active_backend(&self) -> Backend {
        match &self.durable {
            Some(_) if self.connectivity.is_online() => Backend::Durable,
            _ => Backend::Volatile,
        }
    }

    /// Resolves the backend for one logical operation set (one request).
    pub fn resolve(&self) -> ResolvedStore {
        let durable = match &self.durable {
            Some(d) if self.connectivity.is_online() => Some(d.clone()),
            _ => None,
        };
        ResolvedStore {
            pinned_volatile: Arc::new(AtomicBool::new(durable.is_none())),
            durable,
            volatile: self.volatile.clone(),
        }
    }
}

/// A backend choice fixed for the lifetime of one request. If the durable
/// side reports `Unavailable` mid-request, the failed call is replayed on the
/// volatile store and the handle stays there until dropped.
#[derive(Clone)]
pub struct ResolvedStore {
    durable: Option<Arc<DurableStore>>,
    volatile: Arc<VolatileStore>,
    pinned_volatile: Arc<AtomicBool>,
}

impl ResolvedStore {
    fn durable(&self) -> Option<&DurableStore> {
        if self.pinned_volatile.load(Ordering::Acquire) {
            return None;
        }
        self.durable.as_deref()
    }

    fn fall_back(&self, op: &'static str, reason: &str) {
        self.pinned_volatile.store(true, Ordering::Release);
        warn!(op, reason, "durable store unavailable; serving request from volatile store");
    }
}

#[async_trait]
impl UserStore for ResolvedStore {
    fn backend(&self) -> Backend {
        match self.durable() {
            Some(_) => Backend::Durable,
            None => Backend::Volatile,
        }
    }

    async fn create(&self, draft: AccountDraft) -> Result<Account, StoreError> {
        if let Some(d) = self.durable() {
            match d.create(draft.clone()).await {
                Err(StoreError::Unavailable(reason)) => self.fall_back("create", &reason),
                other => return other,
            }
        }
        self.volatile.create(draft).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        if let Some(d) = self.durable() {
            match d.find_by_email(email).await {
                Err(StoreError::Unavailable(reason)) => self.fall_back("find_by_email", &reason),
                other => return other,
            }
        }
        self.volatile.find_by_email(email).await
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, StoreError> {
        if let Some(d) = self.durable() {
            match d.find_by_id(id).await {
                Err(StoreError::Unavailable(reason)) => self.fall_back("find_by_id", &reason),
                other => return other,
            }
        }
        self.volatile.find_by_id(id).await
    }

    async fn update(&self, id: &AccountId, patch: AccountPatch) -> Result<Account, StoreError> {
        if let Some(d) = self.durable() {
            match d.update(id, patch.clone()).await {
                Err(StoreError::Unavailable(reason)) => self.fall_back("update", &reason),
                other => return other,
            }
        }
        self.volatile.update(id, patch).await
    }

    async fn record_login(&self, id: &AccountId) -> Result<Account, StoreError> {
        if let Some(d) = self.durable() {
            match d.record_login(id).await {
                Err(StoreError::Unavailable(reason)) => self.fall_back("record_login", &reason),
                other => return other,
            }
        }
        self.volatile.record_login(id).await
    }
}
