mod error;
pub mod models;
mod pool;
pub mod repositories;

pub use error::*;
pub use models::{DebateSessionRow, UtteranceRow};
pub use pool::*;
pub use repositories::*;
