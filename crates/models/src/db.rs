use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use tracing::info;

pub use configs::DatabaseConfig;

/// Effectively never; the single pooled connection is not reaped or recycled.
const CONNECTION_LIFETIME: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Open the database with exactly one pooled connection.
///
/// SQLite tolerates a single writer; pinning the pool to one connection keeps
/// the engine from ever seeing competing writers from this process. The
/// connection is exempt from idle and lifetime recycling, so a
/// `sqlite::memory:` database and the `busy_timeout` pragma last as long as
/// the pool.
pub async fn connect_with_config(cfg: &DatabaseConfig) -> anyhow::Result<DatabaseConnection> {
    let mut opts = ConnectOptions::new(cfg.url.clone());
    opts.max_connections(1)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
        .idle_timeout(CONNECTION_LIFETIME)
        .max_lifetime(CONNECTION_LIFETIME)
        .sqlx_logging(cfg.sqlx_logging);
    let db = Database::connect(opts).await?;
    db.execute_unprepared(&format!("PRAGMA busy_timeout = {}", cfg.busy_timeout_ms))
        .await?;
    info!(url = %cfg.url, busy_timeout_ms = cfg.busy_timeout_ms, "database connected");
    Ok(db)
}
