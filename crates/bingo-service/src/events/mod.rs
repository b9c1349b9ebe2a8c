//! Publish/subscribe fan-out of engine events.

pub mod bus;

pub use bus::{ControlStream, EventBus, EventStream};
