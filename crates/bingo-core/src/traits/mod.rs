//! Collaborator traits defined in `bingo-core` and implemented by other crates.

pub mod gateway;
pub mod repository;
pub mod store;

pub use gateway::{PaymentGateway, PayoutGateway};
pub use repository::{ClaimRepository, RoomRepository};
pub use store::{MessageStream, StateStore};
