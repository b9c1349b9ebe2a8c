//! Events emitted by the game engine.
//!
//! [`OutboundEvent`]s travel over room and player channels to the
//! transport layer; [`ControlSignal`]s travel over a per-game control
//! channel between engine instances.

pub mod control;
pub mod game;

pub use control::ControlSignal;
pub use game::{GameSnapshot, OutboundEvent, PlayerCard, PlayerView};
