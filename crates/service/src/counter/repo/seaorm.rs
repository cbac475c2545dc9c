use sea_orm::{ConnAcquireErr, DatabaseConnection, DbErr, SqlErr};
use tokio::sync::Mutex;
use tracing::debug;

use crate::counter::domain::Counter;
use crate::counter::errors::StoreError;
use crate::counter::repository::CounterRepository;
use crate::retry::{retry_with_policy, RetryPolicy};

/// SQLite-backed repository.
///
/// Every call, reads included, runs while holding `db`, so the engine sees at
/// most one statement from this process at a time and a read can never observe
/// a write in flight. The guard lives for a single attempt; backoff sleeps
/// happen with the gate released.
pub struct SeaOrmCounterRepository {
    db: Mutex<DatabaseConnection>,
    retry: RetryPolicy,
}

impl SeaOrmCounterRepository {
    pub fn new(db: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self { db: Mutex::new(db), retry }
    }

    /// Close the underlying connection; later calls fail with a store error.
    pub async fn close(&self) -> Result<(), StoreError> {
        let db = self.db.lock().await;
        db.clone().close().await.map_err(classify)
    }
}

/// Map engine errors onto the store taxonomy.
fn classify(err: DbErr) -> StoreError {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return StoreError::AlreadyExists;
    }
    if matches!(err, DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)) {
        return StoreError::Busy(err.to_string());
    }
    let msg = err.to_string();
    if is_busy_message(&msg) {
        StoreError::Busy(msg)
    } else {
        StoreError::Backend(msg)
    }
}

/// SQLITE_BUSY (5) and SQLITE_LOCKED (6) as rendered through sqlx.
fn is_busy_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("database is locked")
        || lower.contains("database is busy")
        || lower.contains("database table is locked")
        || lower.contains("sqlite_busy")
        || lower.contains("(code: 5)")
        || lower.contains("(code: 6)")
}

#[async_trait::async_trait]
impl CounterRepository for SeaOrmCounterRepository {
    async fn get(&self, key: &str) -> Result<Option<Counter>, StoreError> {
        retry_with_policy(&self.retry, || async move {
            let db = self.db.lock().await;
            let row = models::counter::find(&*db, key).await.map_err(classify)?;
            Ok(row.map(Counter::from))
        })
        .await
    }

    async fn insert(&self, counter: &Counter) -> Result<(), StoreError> {
        retry_with_policy(&self.retry, || async move {
            let db = self.db.lock().await;
            models::counter::insert(&*db, &counter.key, counter.value)
                .await
                .map_err(classify)?;
            debug!(key = %counter.key, value = counter.value, "row inserted");
            Ok(())
        })
        .await
    }

    async fn update(&self, counter: &Counter) -> Result<(), StoreError> {
        retry_with_policy(&self.retry, || async move {
            let db = self.db.lock().await;
            let rows = models::counter::set_value(&*db, &counter.key, counter.value)
                .await
                .map_err(classify)?;
            if rows == 0 {
                return Err(StoreError::NotFound);
            }
            debug!(key = %counter.key, value = counter.value, "row updated");
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        retry_with_policy(&self.retry, || async move {
            let db = self.db.lock().await;
            let rows = models::counter::delete(&*db, key).await.map_err(classify)?;
            if rows == 0 {
                return Err(StoreError::NotFound);
            }
            debug!(%key, "row deleted");
            Ok(())
        })
        .await
    }

    async fn list(&self) -> Result<Vec<Counter>, StoreError> {
        retry_with_policy(&self.retry, || async move {
            let db = self.db.lock().await;
            let rows = models::counter::list(&*db).await.map_err(classify)?;
            Ok(rows.into_iter().map(Counter::from).collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sea_orm::{ConnectionTrait, TransactionTrait};

    use crate::counter::{CounterError, CounterService};
    use crate::metrics::STORE_BUSY_RETRIES_TOTAL;
    use crate::test_support::{file_config, file_repository, memory_repository};

    #[test]
    fn busy_messages_are_transient() {
        assert!(is_busy_message("error returned from database: (code: 5) database is locked"));
        assert!(is_busy_message("Execution Error: database is busy"));
        assert!(!is_busy_message("no such table: counters"));
        assert!(matches!(classify(DbErr::Custom("database is locked".into())), StoreError::Busy(_)));
        assert!(matches!(classify(DbErr::Custom("disk I/O error".into())), StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn insert_reports_already_exists_from_constraint() -> anyhow::Result<()> {
        let repo = memory_repository().await?;
        repo.insert(&Counter::new("a", 1)).await?;
        assert_eq!(repo.insert(&Counter::new("a", 2)).await, Err(StoreError::AlreadyExists));
        assert_eq!(repo.get("a").await?, Some(Counter::new("a", 1)));
        Ok(())
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_row_are_not_found() -> anyhow::Result<()> {
        let repo = memory_repository().await?;
        assert_eq!(repo.update(&Counter::new("ghost", 1)).await, Err(StoreError::NotFound));
        assert_eq!(repo.delete("ghost").await, Err(StoreError::NotFound));
        assert!(repo.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn list_is_ordered_by_key() -> anyhow::Result<()> {
        let repo = memory_repository().await?;
        for (k, v) in [("c", 3), ("a", 1), ("b", 2)] {
            repo.insert(&Counter::new(k, v)).await?;
        }
        repo.update(&Counter::new("b", 20)).await?;
        assert_eq!(
            repo.list().await?,
            vec![Counter::new("a", 1), Counter::new("b", 20), Counter::new("c", 3)]
        );
        Ok(())
    }

    #[tokio::test]
    async fn closed_store_surfaces_failure_not_empty_list() -> anyhow::Result<()> {
        let repo = memory_repository().await?;
        repo.close().await?;
        let err = repo.list().await.expect_err("closed pool must fail");
        assert!(!matches!(err, StoreError::AlreadyExists | StoreError::NotFound));
        Ok(())
    }

    #[tokio::test]
    async fn held_write_lock_is_retried_then_surfaces_store_busy() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = file_repository(dir.path(), 20).await?;
        repo.insert(&Counter::new("hits", 1)).await?;
        let svc = CounterService::new(Arc::new(repo));

        // A second connection takes the write lock and keeps it.
        let other = models::db::connect_with_config(&file_config(dir.path(), 20)).await?;
        let txn = other.begin().await?;
        txn.execute_unprepared("UPDATE counters SET value = value + 100 WHERE key = 'hits'")
            .await?;

        let retries_before = STORE_BUSY_RETRIES_TOTAL.get();
        let err = svc.increment_or_create("hits", Some(1)).await.expect_err("write lock is held");
        assert!(matches!(err, CounterError::StoreBusy(_)), "got {err:?}");
        assert!(err.is_retryable());
        // Three attempts means at least two retries were counted.
        assert!(STORE_BUSY_RETRIES_TOTAL.get() >= retries_before + 2);

        txn.rollback().await?;
        let out = svc.increment_or_create("hits", Some(1)).await?;
        assert_eq!(out.into_counter(), Counter::new("hits", 2));

        other.close().await?;
        svc.repository().close().await?;
        Ok(())
    }
}
