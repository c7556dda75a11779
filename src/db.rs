use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Live reachability of the durable store, shared between the store itself,
/// the health probe and the selector. Reads are lock-free.
#[derive(Debug, Clone)]
pub struct Connectivity(Arc<AtomicBool>);

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    pub fn is_online(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns true if this call changed the state.
    pub fn mark_offline(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    /// Returns true if this call changed the state.
    pub fn mark_online(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

/// Builds a lazily connecting pool. Never fails on an unreachable server;
/// only an unparsable URL is an error.
pub fn lazy_pool(cfg: &DatabaseConfig, url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(cfg.connect_timeout_secs.max(1)))
        .connect_lazy(url)
        .context("parse DATABASE_URL")
}

pub async fn ping(db: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(db).await.map(|_| ())
}

pub async fn run_migrations(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("apply migrations")
}

/// Applies one ping result to `connectivity`. The durable store only goes
/// online once its schema is in place; `migrated` remembers that so later
/// probes skip the migration step.
pub async fn apply_probe<M, Fut>(
    ping: Result<(), sqlx::Error>,
    connectivity: &Connectivity,
    migrated: &mut bool,
    migrate: M,
) where
    M: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    if let Err(e) = ping {
        if connectivity.mark_offline() {
            warn!(error = %e, "durable store disconnected; using volatile store");
        }
        return;
    }

    if !*migrated {
        if let Err(e) = migrate().await {
            warn!(error = %e, "migrations failed; durable store stays out of rotation");
            connectivity.mark_offline();
            return;
        }
        *migrated = true;
    }

    if connectivity.mark_online() {
        info!("durable store online; new requests use it");
    }
}

/// First connection attempt at startup. Failure leaves the service in
/// degraded mode instead of aborting. Returns whether migrations ran.
pub async fn connect_initial(db: &PgPool, connectivity: &Connectivity) -> bool {
    let mut migrated = false;
    apply_probe(ping(db).await, connectivity, &mut migrated, || run_migrations(db)).await;
    if !connectivity.is_online() {
        warn!("running on volatile store; accounts created while degraded are lost on restart");
    }
    migrated
}

/// Periodically pings the durable store and updates `connectivity`,
/// retrying migrations until they succeed once.
pub fn spawn_health_probe(
    db: PgPool,
    connectivity: Connectivity,
    mut migrated: bool,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let ping = ping(&db).await;
            apply_probe(ping, &connectivity, &mut migrated, || run_migrations(&db)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_report_changes_only() {
        let c = Connectivity::new(false);
        assert!(!c.is_online());
        assert!(!c.mark_offline());
        assert!(c.mark_online());
        assert!(!c.mark_online());
        assert!(c.is_online());
        assert!(c.mark_offline());
        assert!(!c.is_online());
    }

    #[test]
    fn clones_share_state() {
        let a = Connectivity::new(true);
        let b = a.clone();
        b.mark_offline();
        assert!(!a.is_online());
    }

    #[tokio::test]
    async fn probe_marks_unreachable_database_offline() {
        let cfg = DatabaseConfig {
            url: None,
            connect_timeout_secs: 1,
            health_interval_secs: 1,
        };
        let db = lazy_pool(&cfg, "postgres://u:p@127.0.0.1:1/none").unwrap();
        let connectivity = Connectivity::new(true);
        assert!(!connect_initial(&db, &connectivity).await);
        assert!(!connectivity.is_online());
    }

    async fn failing_migration() -> anyhow::Result<()> {
        Err(anyhow::anyhow!("relation accounts does not exist"))
    }

    async fn passing_migration() -> anyhow::Result<()> {
        Ok(())
    }

    async fn forbidden_migration() -> anyhow::Result<()> {
        panic!("migration must not run here")
    }

    #[tokio::test]
    async fn failed_migration_keeps_store_offline_until_a_retry_succeeds() {
        let connectivity = Connectivity::new(false);
        let mut migrated = false;

        apply_probe(Ok(()), &connectivity, &mut migrated, failing_migration).await;
        assert!(!connectivity.is_online());
        assert!(!migrated);

        apply_probe(Ok(()), &connectivity, &mut migrated, passing_migration).await;
        assert!(connectivity.is_online());
        assert!(migrated);

        // Once migrated, later probes never run migrations again.
        apply_probe(Ok(()), &connectivity, &mut migrated, forbidden_migration).await;
        assert!(connectivity.is_online());
    }

    #[tokio::test]
    async fn failed_ping_marks_offline_without_migrating() {
        let connectivity = Connectivity::new(true);
        let mut migrated = false;
        apply_probe(
            Err(sqlx::Error::PoolTimedOut),
            &connectivity,
            &mut migrated,
            forbidden_migration,
        )
        .await;
        assert!(!connectivity.is_online());
        assert!(!migrated);
    }
}
