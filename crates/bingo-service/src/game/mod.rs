//! Game lifecycle: state persistence, the orchestrator, and finalization.

mod bingo;
mod countdown;
pub mod finalize;
mod marks;
mod membership;
pub mod orchestrator;
pub mod store;

pub use bingo::ClaimRequest;
pub use finalize::{Finalizer, NO_WINNER};
pub use marks::CardMarks;
pub use membership::{JoinOutcome, JoinRequest, LeaveOutcome};
pub use orchestrator::GameOrchestrator;
pub use store::GameStore;
