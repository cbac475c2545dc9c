//! Counter module: three-layer architecture (domain, repository, service).
//!
//! `CounterService` owns the per-key serialization; `CounterRepository`
//! implementations own the single-writer gate to the backing table.

pub mod domain;
pub mod errors;
pub mod locks;
pub mod repository;
pub mod repo;
pub mod service;

pub use domain::{Counter, Incremented};
pub use errors::{CounterError, StoreError};
pub use service::CounterService;
