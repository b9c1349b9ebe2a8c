//! # bingo-cache
//!
//! Shared State Store backends for the bingo engine. Two modes:
//!
//! - **memory**: single-process store built on [dashmap](https://crates.io/crates/dashmap)
//!   with per-entry expiry and broadcast-channel pub/sub
//! - **redis**: Redis-backed store using the [redis](https://crates.io/crates/redis) crate,
//!   shared by every engine instance
//!
//! The backend is selected at runtime from configuration. This crate also
//! owns the key/channel builders and the distributed [`lock::LockCoordinator`].

pub mod keys;
pub mod lock;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use lock::{LockCoordinator, LockToken, RetryPolicy};
pub use provider::StoreManager;
