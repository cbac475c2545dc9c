#![cfg(test)]
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use migration::MigratorTrait;
use models::db::{connect_with_config, DatabaseConfig};

use crate::counter::repo::seaorm::SeaOrmCounterRepository;
use crate::retry::RetryPolicy;

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5))
}

/// Fresh in-memory SQLite store with the schema applied.
pub async fn memory_repository() -> Result<Arc<SeaOrmCounterRepository>, anyhow::Error> {
    let cfg = DatabaseConfig { url: "sqlite::memory:".into(), ..Default::default() };
    let db = connect_with_config(&cfg).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(Arc::new(SeaOrmCounterRepository::new(db, fast_retry())))
}

/// Settings for `counters.db` inside `dir`, with SQLite's own lock wait cut
/// down to `busy_timeout_ms`.
pub fn file_config(dir: &Path, busy_timeout_ms: u64) -> DatabaseConfig {
    DatabaseConfig {
        url: format!("sqlite://{}/counters.db?mode=rwc", dir.display()),
        busy_timeout_ms,
        ..Default::default()
    }
}

/// File-backed store under `dir` with the schema applied.
pub async fn file_repository(dir: &Path, busy_timeout_ms: u64) -> Result<SeaOrmCounterRepository, anyhow::Error> {
    let db = connect_with_config(&file_config(dir, busy_timeout_ms)).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(SeaOrmCounterRepository::new(db, fast_retry()))
}
