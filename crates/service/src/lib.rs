//! Service layer for the counter store.
//! - `counter` holds the increment-or-create state machine and the store it runs on.
//! - `retry` bounds how long a store call may spin on engine lock contention.
//! - `runtime` wires config, database and migrations together at startup.

pub mod counter;
pub mod metrics;
pub mod retry;
pub mod runtime;
#[cfg(test)]
pub mod test_support;
