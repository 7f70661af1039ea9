mod debate_session_repository;
mod utterance_repository;

pub use debate_session_repository::*;
pub use utterance_repository::*;
