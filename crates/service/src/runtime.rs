//! Runtime environment helpers
//!
//! Startup wiring for the durable store: data directory, connection, schema.

use migration::MigratorTrait;
use tracing::info;

use crate::counter::repo::seaorm::SeaOrmCounterRepository;
use crate::retry::RetryPolicy;

/// Open the configured database, apply migrations and wrap it in the repository.
///
/// Any failure here is a startup failure: the caller is expected to exit.
pub async fn open_store(cfg: &configs::AppConfig) -> anyhow::Result<SeaOrmCounterRepository> {
    common::env::ensure_sqlite_dir(&cfg.database.url).await?;
    let db = models::db::connect_with_config(&cfg.database).await?;
    migration::Migrator::up(&db, None).await?;
    info!(
        max_attempts = cfg.store.max_attempts,
        backoff_base_ms = cfg.store.backoff_base_ms,
        backoff_max_ms = cfg.store.backoff_max_ms,
        "counter store ready"
    );
    Ok(SeaOrmCounterRepository::new(db, RetryPolicy::from_config(&cfg.store)))
}
