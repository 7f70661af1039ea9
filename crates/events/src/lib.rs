//! Event system for debate sessions
//!
//! This crate provides the session event types and the process-wide event
//! bus that every session event is forwarded to.

mod bus;
mod types;

pub use bus::{EventBus, FeedFilter};
pub use types::*;
