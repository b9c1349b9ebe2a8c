//! # bingo-core
//!
//! Core crate for the bingo game engine. Contains the configuration schema,
//! typed identifiers, domain types (cards, game state, claims, rooms),
//! outbound event envelopes, the collaborator traits, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other bingo crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
