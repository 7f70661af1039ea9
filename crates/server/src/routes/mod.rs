mod control;
mod health;
mod sessions;
pub mod sse;

pub use control::*;
pub use health::*;
pub use sessions::*;
