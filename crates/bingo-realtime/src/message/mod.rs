//! Inbound message types and decoding.

pub mod types;
pub mod validator;

pub use types::InboundMessage;
pub use validator::decode_inbound;
