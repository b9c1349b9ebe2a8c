//! Background maintenance for the bingo engine.
//!
//! A cron scheduler periodically runs the [`GameReaper`], which recovers
//! countdowns whose owning instance died and purges games nobody drives
//! anymore.

pub mod reaper;
pub mod scheduler;

pub use reaper::{GameReaper, ReapReport};
pub use scheduler::MaintenanceScheduler;
