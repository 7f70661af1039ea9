mod intervention;
mod options;
mod phase;
mod session;
mod utterance;

pub use intervention::*;
pub use options::*;
pub use phase::*;
pub use session::*;
pub use utterance::*;
