use crate::error::DbError;
use crate::models::UtteranceRow;
use debate_core::Utterance;
use sqlx::SqlitePool;
use uuid::Uuid;

#[derive(Clone)]
pub struct UtteranceRepository {
    pool: SqlitePool,
}

impl UtteranceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an utterance, enforcing that its sequence is exactly one past
    /// the session's current maximum.
    pub async fn append(&self, utterance: &Utterance) -> Result<Utterance, DbError> {
        let row = UtteranceRow::from(utterance);
        let mut tx = self.pool.begin().await?;

        let (current,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sequence), 0) FROM utterances WHERE session_id = ?",
        )
        .bind(&row.session_id)
        .fetch_one(&mut *tx)
        .await?;

        let expected = current.max(0) as u64 + 1;
        if utterance.sequence != expected {
            return Err(DbError::SequenceConflict {
                session_id: utterance.session_id,
                expected,
                actual: utterance.sequence,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO utterances (session_id, sequence, speaker, phase, turn_kind, text, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.session_id)
        .bind(row.sequence)
        .bind(&row.speaker)
        .bind(&row.phase)
        .bind(&row.turn_kind)
        .bind(&row.text)
        .bind(&row.metadata)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::SequenceConflict {
                    session_id: utterance.session_id,
                    expected,
                    actual: utterance.sequence,
                }
            }
            other => DbError::Sqlx(other),
        })?;

        tx.commit().await?;

        tracing::debug!(
            session_id = %utterance.session_id,
            sequence = utterance.sequence,
            speaker = %utterance.speaker,
            "Utterance persisted"
        );

        Ok(utterance.clone())
    }

    /// Utterances with `sequence > after_sequence`, ascending.
    pub async fn find_by_session_since(
        &self,
        session_id: Uuid,
        after_sequence: u64,
    ) -> Result<Vec<Utterance>, DbError> {
        let rows: Vec<UtteranceRow> = sqlx::query_as(
            r#"
            SELECT session_id, sequence, speaker, phase, turn_kind, text, metadata, created_at
            FROM utterances
            WHERE session_id = ? AND sequence > ?
            ORDER BY sequence ASC
            "#,
        )
        .bind(session_id.to_string())
        .bind(after_sequence as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UtteranceRow::into_domain).collect()
    }

    pub async fn find_by_session(&self, session_id: Uuid) -> Result<Vec<Utterance>, DbError> {
        self.find_by_session_since(session_id, 0).await
    }

    pub async fn last_sequence(&self, session_id: Uuid) -> Result<u64, DbError> {
        let (max,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(sequence), 0) FROM utterances WHERE session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(max.max(0) as u64)
    }
}
