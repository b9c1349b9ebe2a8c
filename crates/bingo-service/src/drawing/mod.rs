//! Number drawing: one owner per game, one number per tick.

pub mod phase;
pub mod runner;

pub use phase::{DrawPhase, DrawSummary};
pub use runner::DrawingLoop;
