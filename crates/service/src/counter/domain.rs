use serde::{Deserialize, Serialize};

/// Delta applied when the caller does not supply one.
pub const DEFAULT_DELTA: i64 = 1;

/// A tracked integer quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub key: String,
    pub value: i64,
}

impl Counter {
    pub fn new(key: impl Into<String>, value: i64) -> Self {
        Self { key: key.into(), value }
    }
}

impl From<models::counter::Model> for Counter {
    fn from(m: models::counter::Model) -> Self {
        Self { key: m.key, value: m.value }
    }
}

/// Result of an increment-or-create call, telling the caller which branch ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incremented {
    Created(Counter),
    Updated(Counter),
}

impl Incremented {
    pub fn into_counter(self) -> Counter {
        match self {
            Incremented::Created(c) | Incremented::Updated(c) => c,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Incremented::Created(_))
    }
}
