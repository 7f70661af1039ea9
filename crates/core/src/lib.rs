//! Domain model for structured debate sessions.
//!
//! Everything here is plain data: the orchestrator owns mutation, the
//! server and event hub only read.

pub mod domain;
mod error;

pub use domain::*;
pub use error::{CoreError, StateError};
