use async_trait::async_trait;

use super::domain::Counter;
use super::errors::StoreError;

/// Durable store abstraction for counters.
///
/// Implementations are the only path to the backing table and must not let
/// two writes reach the engine at once; every call either fully applies or
/// leaves the table untouched.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Counter>, StoreError>;
    /// Fails with `AlreadyExists` when the key is taken, as reported by the engine.
    async fn insert(&self, counter: &Counter) -> Result<(), StoreError>;
    async fn update(&self, counter: &Counter) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<Counter>, StoreError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::{BTreeMap, HashMap, VecDeque};
    use std::sync::{Mutex, MutexGuard};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Op { Get, Insert, Update, Delete, List }

    #[derive(Default)]
    struct State {
        rows: BTreeMap<String, i64>,
        failures: HashMap<Op, VecDeque<StoreError>>,
        calls: HashMap<Op, usize>,
        // value a simulated foreign writer stores right before our next insert
        preempt_insert: VecDeque<i64>,
    }

    #[derive(Default)]
    pub struct MockCounterRepository {
        state: Mutex<State>,
    }

    impl MockCounterRepository {
        pub fn new() -> Self { Self::default() }

        fn state(&self) -> MutexGuard<'_, State> {
            self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        pub fn seed(&self, key: &str, value: i64) {
            self.state().rows.insert(key.to_string(), value);
        }

        pub fn value_of(&self, key: &str) -> Option<i64> {
            self.state().rows.get(key).copied()
        }

        /// Queue an error returned by the next call to `op` instead of touching the rows.
        pub fn fail_next(&self, op: Op, err: StoreError) {
            self.state().failures.entry(op).or_default().push_back(err);
        }

        /// Make the next insert lose a creation race: another writer stores `value`
        /// under the same key first, and the insert reports `AlreadyExists`.
        pub fn preempt_next_insert(&self, value: i64) {
            self.state().preempt_insert.push_back(value);
        }

        pub fn calls(&self, op: Op) -> usize {
            self.state().calls.get(&op).copied().unwrap_or(0)
        }

        pub fn total_calls(&self) -> usize {
            self.state().calls.values().sum()
        }

        fn enter(&self, op: Op) -> Result<MutexGuard<'_, State>, StoreError> {
            let mut st = self.state();
            *st.calls.entry(op).or_default() += 1;
            if let Some(err) = st.failures.get_mut(&op).and_then(|q| q.pop_front()) {
                return Err(err);
            }
            Ok(st)
        }
    }

    #[async_trait]
    impl CounterRepository for MockCounterRepository {
        async fn get(&self, key: &str) -> Result<Option<Counter>, StoreError> {
            let st = self.enter(Op::Get)?;
            Ok(st.rows.get(key).map(|v| Counter::new(key, *v)))
        }

        async fn insert(&self, counter: &Counter) -> Result<(), StoreError> {
            let mut st = self.enter(Op::Insert)?;
            if let Some(foreign) = st.preempt_insert.pop_front() {
                st.rows.insert(counter.key.clone(), foreign);
                return Err(StoreError::AlreadyExists);
            }
            if st.rows.contains_key(&counter.key) {
                return Err(StoreError::AlreadyExists);
            }
            st.rows.insert(counter.key.clone(), counter.value);
            Ok(())
        }

        async fn update(&self, counter: &Counter) -> Result<(), StoreError> {
            let mut st = self.enter(Op::Update)?;
            match st.rows.get_mut(&counter.key) {
                Some(v) => { *v = counter.value; Ok(()) }
                None => Err(StoreError::NotFound),
            }
        }

        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            let mut st = self.enter(Op::Delete)?;
            st.rows.remove(key).map(|_| ()).ok_or(StoreError::NotFound)
        }

        async fn list(&self) -> Result<Vec<Counter>, StoreError> {
            let st = self.enter(Op::List)?;
            Ok(st.rows.iter().map(|(k, v)| Counter::new(k.as_str(), *v)).collect())
        }
    }
}
