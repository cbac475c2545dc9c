use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use super::domain::{Counter, Incremented, DEFAULT_DELTA};
use super::errors::{CounterError, StoreError};
use super::locks::KeyLocks;
use super::repository::CounterRepository;
use crate::metrics::{
    COUNTERS_CREATED_TOTAL, COUNTERS_DELETED_TOTAL, CREATION_CONFLICTS_TOTAL, INCREMENTS_TOTAL, STORE_ERRORS_TOTAL,
};

/// Counter business service independent of web framework.
///
/// Mutations on the same key are linearized through `KeyLocks`; mutations on
/// different keys proceed independently. The repository is injected at
/// construction and shared by every caller.
pub struct CounterService<R: CounterRepository> {
    repo: Arc<R>,
    locks: KeyLocks,
}

impl<R: CounterRepository> CounterService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo, locks: KeyLocks::new() }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Add `delta` (default 1) to `key`, creating the counter at `delta` if absent.
    ///
    /// # Examples
    /// ```
    /// use service::counter::{CounterService, Counter};
    /// use service::counter::repository::mock::MockCounterRepository;
    /// use std::sync::Arc;
    /// let svc = CounterService::new(Arc::new(MockCounterRepository::new()));
    /// let first = tokio_test::block_on(svc.increment_or_create("a", None)).unwrap();
    /// assert!(first.is_created());
    /// let second = tokio_test::block_on(svc.increment_or_create("a", Some(4))).unwrap();
    /// assert_eq!(second.into_counter(), Counter::new("a", 5));
    /// ```
    #[instrument(skip(self))]
    pub async fn increment_or_create(&self, key: &str, delta: Option<i64>) -> Result<Incremented, CounterError> {
        models::counter::validate_key(key).map_err(|_| CounterError::InvalidKey)?;
        let delta = delta.unwrap_or(DEFAULT_DELTA);

        let _guard = self.locks.lock(key).await;
        // A foreign writer (another process on the same file) may create or
        // remove the row between our read and write; tolerate that once.
        let mut raced = false;
        loop {
            match self.repo.get(key).await.map_err(|e| self.store_failure("get", e))? {
                Some(existing) => {
                    let value = existing.value.checked_add(delta).ok_or_else(|| CounterError::Overflow {
                        key: key.to_string(),
                        current: existing.value,
                        delta,
                    })?;
                    let updated = Counter::new(key, value);
                    match self.repo.update(&updated).await {
                        Ok(()) => {
                            INCREMENTS_TOTAL.inc();
                            info!(key = %key, delta, value, "counter_incremented");
                            return Ok(Incremented::Updated(updated));
                        }
                        Err(StoreError::NotFound) if !raced => {
                            warn!(key = %key, "counter vanished before update; re-reading");
                            raced = true;
                        }
                        Err(StoreError::NotFound) => return Err(self.conflict(key)),
                        Err(e) => return Err(self.store_failure("update", e)),
                    }
                }
                None => {
                    let created = Counter::new(key, delta);
                    match self.repo.insert(&created).await {
                        Ok(()) => {
                            COUNTERS_CREATED_TOTAL.inc();
                            info!(key = %key, value = delta, "counter_created");
                            return Ok(Incremented::Created(created));
                        }
                        Err(StoreError::AlreadyExists) if !raced => {
                            CREATION_CONFLICTS_TOTAL.inc();
                            warn!(key = %key, "lost creation race; retrying as increment");
                            raced = true;
                        }
                        Err(StoreError::AlreadyExists) => {
                            CREATION_CONFLICTS_TOTAL.inc();
                            return Err(self.conflict(key));
                        }
                        Err(e) => return Err(self.store_failure("insert", e)),
                    }
                }
            }
        }
    }

    /// All counters ordered by key. An empty store yields an empty vector;
    /// an unavailable store yields an error, never an empty vector.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Counter>, CounterError> {
        let counters = self.repo.list().await.map_err(|e| self.store_failure("list", e))?;
        debug!(count = counters.len(), "counters listed");
        Ok(counters)
    }

    /// Remove `key` and return its last value.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<Counter, CounterError> {
        if key.is_empty() {
            return Err(CounterError::KeyNotFound(String::new()));
        }

        let _guard = self.locks.lock(key).await;
        let snapshot = self
            .repo
            .get(key)
            .await
            .map_err(|e| self.store_failure("get", e))?
            .ok_or_else(|| CounterError::KeyNotFound(key.to_string()))?;

        match self.repo.delete(key).await {
            Ok(()) => {
                COUNTERS_DELETED_TOTAL.inc();
                info!(key = %key, value = snapshot.value, "counter_deleted");
                Ok(snapshot)
            }
            Err(StoreError::NotFound) => Err(CounterError::KeyNotFound(key.to_string())),
            Err(e) => Err(self.store_failure("delete", e)),
        }
    }

    fn conflict(&self, key: &str) -> CounterError {
        warn!(key = %key, "creation race repeated; giving up");
        CounterError::Conflict(key.to_string())
    }

    fn store_failure(&self, op: &'static str, e: StoreError) -> CounterError {
        STORE_ERRORS_TOTAL.inc();
        match &e {
            StoreError::Busy(msg) => warn!(op, error = %msg, "store busy after retries"),
            other => error!(op, error = %other, "store call failed"),
        }
        CounterError::from(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::repository::mock::{MockCounterRepository, Op};
    use crate::test_support::memory_repository;

    fn mock_service() -> (Arc<MockCounterRepository>, CounterService<MockCounterRepository>) {
        let repo = Arc::new(MockCounterRepository::new());
        (repo.clone(), CounterService::new(repo))
    }

    #[tokio::test]
    async fn missing_delta_defaults_to_one() -> anyhow::Result<()> {
        let (_, svc) = mock_service();
        let out = svc.increment_or_create("a", None).await?;
        assert_eq!(out, Incremented::Created(Counter::new("a", 1)));
        Ok(())
    }

    #[tokio::test]
    async fn create_then_increment_sums_deltas() -> anyhow::Result<()> {
        let (repo, svc) = mock_service();
        assert_eq!(svc.increment_or_create("k", Some(7)).await?, Incremented::Created(Counter::new("k", 7)));
        assert_eq!(svc.increment_or_create("k", Some(-10)).await?, Incremented::Updated(Counter::new("k", -3)));
        assert_eq!(repo.value_of("k"), Some(-3));
        Ok(())
    }

    #[tokio::test]
    async fn empty_key_never_touches_store() {
        let (repo, svc) = mock_service();
        assert_eq!(svc.increment_or_create("", Some(1)).await, Err(CounterError::InvalidKey));
        assert_eq!(svc.delete("").await, Err(CounterError::KeyNotFound(String::new())));
        assert_eq!(repo.total_calls(), 0);
    }

    #[tokio::test]
    async fn overflow_is_rejected_and_value_kept() {
        let (repo, svc) = mock_service();
        repo.seed("big", i64::MAX - 1);
        let err = svc.increment_or_create("big", Some(2)).await.expect_err("overflow");
        assert_eq!(err, CounterError::Overflow { key: "big".into(), current: i64::MAX - 1, delta: 2 });
        assert_eq!(repo.value_of("big"), Some(i64::MAX - 1));
        assert_eq!(repo.calls(Op::Update), 0);

        repo.seed("small", i64::MIN);
        assert!(matches!(svc.increment_or_create("small", Some(-1)).await, Err(CounterError::Overflow { .. })));
    }

    #[tokio::test]
    async fn lost_creation_race_retries_as_increment() -> anyhow::Result<()> {
        let (repo, svc) = mock_service();
        repo.preempt_next_insert(10);
        let out = svc.increment_or_create("x", Some(1)).await?;
        assert_eq!(out, Incremented::Updated(Counter::new("x", 11)));
        assert_eq!(repo.calls(Op::Insert), 1);
        assert_eq!(repo.calls(Op::Get), 2);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_creation_race_is_conflict() {
        let (repo, svc) = mock_service();
        repo.fail_next(Op::Insert, StoreError::AlreadyExists);
        repo.fail_next(Op::Insert, StoreError::AlreadyExists);
        let err = svc.increment_or_create("x", Some(1)).await.expect_err("conflict");
        assert_eq!(err, CounterError::Conflict("x".into()));
        assert!(err.is_retryable());
        assert_eq!(repo.calls(Op::Insert), 2);
        assert_eq!(repo.value_of("x"), None);
    }

    #[tokio::test]
    async fn store_errors_surface_unmodified() {
        let (repo, svc) = mock_service();
        repo.fail_next(Op::Get, StoreError::Busy("database is locked".into()));
        assert_eq!(
            svc.increment_or_create("a", None).await,
            Err(CounterError::StoreBusy("database is locked".into()))
        );
        repo.fail_next(Op::List, StoreError::Backend("disk I/O error".into()));
        assert_eq!(svc.list().await, Err(CounterError::Store("disk I/O error".into())));
        // a failed call leaves the service usable for the next request
        assert_eq!(svc.increment_or_create("a", None).await, Ok(Incremented::Created(Counter::new("a", 1))));
    }

    #[tokio::test]
    async fn delete_returns_snapshot_and_removes_row() -> anyhow::Result<()> {
        let (repo, svc) = mock_service();
        repo.seed("a", 5);
        assert_eq!(svc.delete("a").await?, Counter::new("a", 5));
        assert!(svc.list().await?.iter().all(|c| c.key != "a"));
        Ok(())
    }

    #[tokio::test]
    async fn delete_missing_key_leaves_store_unchanged() -> anyhow::Result<()> {
        let (repo, svc) = mock_service();
        repo.seed("other", 2);
        assert_eq!(svc.delete("nope").await, Err(CounterError::KeyNotFound("nope".into())));
        assert_eq!(repo.calls(Op::Delete), 0);
        assert_eq!(svc.list().await?, vec![Counter::new("other", 2)]);
        Ok(())
    }

    #[tokio::test]
    async fn list_of_empty_store_is_empty() -> anyhow::Result<()> {
        let (_, svc) = mock_service();
        assert!(svc.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn recreate_after_delete_starts_fresh() -> anyhow::Result<()> {
        let svc = CounterService::new(memory_repository().await?);
        svc.increment_or_create("k", Some(10)).await?;
        assert_eq!(svc.delete("k").await?, Counter::new("k", 10));
        let again = svc.increment_or_create("k", Some(3)).await?;
        assert_eq!(again, Incremented::Created(Counter::new("k", 3)));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_concurrent_creations_yield_one_row() -> anyhow::Result<()> {
        let svc = Arc::new(CounterService::new(memory_repository().await?));
        let a = tokio::spawn({ let svc = svc.clone(); async move { svc.increment_or_create("x", Some(1)).await } });
        let b = tokio::spawn({ let svc = svc.clone(); async move { svc.increment_or_create("x", Some(1)).await } });
        let (a, b) = (a.await??, b.await??);
        assert_eq!(a.is_created() as u8 + b.is_created() as u8, 1);
        assert_eq!(svc.list().await?, vec![Counter::new("x", 2)]);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_sum_exactly() -> anyhow::Result<()> {
        let svc = Arc::new(CounterService::new(memory_repository().await?));
        let deltas: Vec<i64> = (1..=40).map(|i| if i % 3 == 0 { -i } else { i }).collect();
        let expected: i64 = deltas.iter().sum();

        let mut tasks = Vec::new();
        for (i, d) in deltas.into_iter().enumerate() {
            let svc = svc.clone();
            tasks.push(tokio::spawn(async move {
                svc.increment_or_create("shared", Some(d)).await?;
                // unrelated keys interleave with the shared one
                svc.increment_or_create(&format!("k{}", i % 4), None).await
            }));
        }
        for t in tasks {
            t.await??;
        }

        let all = svc.list().await?;
        let shared = all.iter().find(|c| c.key == "shared").map(|c| c.value);
        assert_eq!(shared, Some(expected));
        let side: i64 = all.iter().filter(|c| c.key.starts_with('k')).map(|c| c.value).sum();
        assert_eq!(side, 40);
        assert_eq!(all.len(), 5);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn delete_racing_increments_is_linearized() -> anyhow::Result<()> {
        let svc = Arc::new(CounterService::new(memory_repository().await?));
        svc.increment_or_create("r", Some(100)).await?;

        let inc = tokio::spawn({ let svc = svc.clone(); async move { svc.increment_or_create("r", Some(1)).await } });
        let del = tokio::spawn({ let svc = svc.clone(); async move { svc.delete("r").await } });
        let inc = inc.await??;
        let deleted = del.await??;

        let remaining = svc.list().await?;
        if inc.is_created() {
            // delete ran first: it saw 100, increment recreated at 1
            assert_eq!(deleted, Counter::new("r", 100));
            assert_eq!(remaining, vec![Counter::new("r", 1)]);
        } else {
            assert_eq!(deleted, Counter::new("r", 101));
            assert!(remaining.is_empty());
        }
        Ok(())
    }
}
