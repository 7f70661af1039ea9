use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Sequence conflict for session {session_id}: expected {expected}, got {actual}")]
    SequenceConflict {
        session_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}
