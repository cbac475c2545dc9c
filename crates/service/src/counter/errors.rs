use thiserror::Error;

use crate::retry::Retryable;

/// Outcomes of a single durable store call other than success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("counter already exists")]
    AlreadyExists,
    #[error("counter not found")]
    NotFound,
    #[error("store busy: {0}")]
    Busy(String),
    #[error("store failure: {0}")]
    Backend(String),
}

impl Retryable for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

/// Business errors surfaced by `CounterService`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("key must be a non-empty string")]
    InvalidKey,
    #[error("creation of counter `{0}` kept conflicting with a concurrent writer")]
    Conflict(String),
    #[error("counter `{0}` not found")]
    KeyNotFound(String),
    #[error("adding {delta} to counter `{key}` (currently {current}) overflows i64")]
    Overflow { key: String, current: i64, delta: i64 },
    #[error("store busy: {0}")]
    StoreBusy(String),
    #[error("store error: {0}")]
    Store(String),
}

impl CounterError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            CounterError::InvalidKey => 2001,
            CounterError::KeyNotFound(_) => 2002,
            CounterError::Overflow { .. } => 2003,
            CounterError::Conflict(_) => 2101,
            CounterError::StoreBusy(_) => 2201,
            CounterError::Store(_) => 2202,
        }
    }

    /// Whether the same request may succeed if the caller simply tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CounterError::Conflict(_) | CounterError::StoreBusy(_))
    }
}

impl From<StoreError> for CounterError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Busy(msg) => CounterError::StoreBusy(msg),
            StoreError::Backend(msg) => CounterError::Store(msg),
            other @ (StoreError::AlreadyExists | StoreError::NotFound) => CounterError::Store(other.to_string()),
        }
    }
}
