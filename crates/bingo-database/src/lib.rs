//! # bingo-database
//!
//! PostgreSQL connection management, migrations, and the thin adapters
//! behind the engine's room, claim, payment, and payout collaborators.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{PgClaimRepository, PgRoomRepository, PgWallet};
