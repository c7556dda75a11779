use std::{sync::Arc, time::Duration};

use tracing::warn;

use crate::{
    accounts::{DurableStore, StoreSelector, VolatileStore},
    auth::{jwt::TokenService, password::PasswordHasher},
    config::AppConfig,
    db::{self, Connectivity},
    rate_limit::{RateLimiter, SharedRateLimiter},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: StoreSelector,
    pub tokens: TokenService,
    pub hasher: PasswordHasher,
    pub auth_limiter: SharedRateLimiter,
}

impl AppState {
    /// Wires every service from config. Never fails because the durable
    /// store is missing or down; the volatile store covers for it.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::from_config(&config.hashing)?;
        let volatile = Arc::new(VolatileStore::new(hasher.clone()));

        let stores = match config.database.url.as_deref() {
            Some(url) => match db::lazy_pool(&config.database, url) {
                Ok(pool) => {
                    let connectivity = Connectivity::new(false);
                    let migrated = db::connect_initial(&pool, &connectivity).await;
                    db::spawn_health_probe(
                        pool.clone(),
                        connectivity.clone(),
                        migrated,
                        Duration::from_secs(config.database.health_interval_secs.max(1)),
                    );
                    let durable = Arc::new(DurableStore::new(
                        pool,
                        hasher.clone(),
                        connectivity.clone(),
                    ));
                    StoreSelector::new(Some(durable), volatile, connectivity)
                }
                Err(e) => {
                    warn!(error = %e, "invalid DATABASE_URL; running on volatile store");
                    StoreSelector::volatile_only(volatile)
                }
            },
            None => {
                warn!("DATABASE_URL not set; running on volatile store, data is lost on restart");
                StoreSelector::volatile_only(volatile)
            }
        };

        Ok(Self::from_parts(config, stores, hasher))
    }

    pub fn from_parts(config: AppConfig, stores: StoreSelector, hasher: PasswordHasher) -> Self {
        Self {
            tokens: TokenService::new(&config.jwt),
            auth_limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            config: Arc::new(config),
            stores,
            hasher,
        }
    }

    /// Degraded-mode state with only the volatile store.
    pub fn in_memory(config: AppConfig, hasher: PasswordHasher) -> Self {
        let volatile = Arc::new(VolatileStore::new(hasher.clone()));
        Self::from_parts(config, StoreSelector::volatile_only(volatile), hasher)
    }
}
