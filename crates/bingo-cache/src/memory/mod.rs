//! In-memory state store for single-process deployments and tests.

pub mod store;

pub use store::MemoryStateStore;
