//! # bingo-realtime
//!
//! Glue between a player's transport connection and the game engine:
//! decoding inbound `{type, payload}` messages, dispatching them to the
//! orchestrator, replying to the requester, and relaying room and player
//! events back as one stream.

pub mod handler;
pub mod message;
pub mod relay;

pub use handler::{Session, SessionHandler};
pub use message::InboundMessage;
pub use relay::SessionRelay;
