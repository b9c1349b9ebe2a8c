//! Card pool and card ownership.

pub mod arbiter;
pub mod pool;

pub use arbiter::ClaimArbiter;
pub use pool::{CardPoolStore, generate_card, generate_pool};
