//! # bingo-service
//!
//! The game session engine: event bus, card pool and claim arbitration,
//! claim verification, the number drawing loop, and the orchestrator that
//! drives each room's game through READY, COUNTDOWN, PLAYING, COMPLETED.
//!
//! Every cross-instance decision goes through locks in the shared store;
//! no process-local state is authoritative.

pub mod card;
pub mod context;
pub mod drawing;
pub mod error;
pub mod events;
pub mod game;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod verifier;

pub use context::{Collaborators, EngineContext};
pub use error::{CardClaimError, CardReleaseError, GameError};
pub use game::{CardMarks, ClaimRequest, GameOrchestrator, JoinOutcome, JoinRequest, LeaveOutcome};
