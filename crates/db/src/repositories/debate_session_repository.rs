use crate::error::DbError;
use crate::models::DebateSessionRow;
use debate_core::Session;
use sqlx::SqlitePool;
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"
    SELECT id, config, normalized_question, phase, turns_taken, status, last_sequence,
           error, created_at, started_at, completed_at
    FROM debate_sessions
"#;

#[derive(Clone)]
pub struct DebateSessionRepository {
    pool: SqlitePool,
}

impl DebateSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, session: &Session) -> Result<Session, DbError> {
        let row = DebateSessionRow::try_from(session)?;

        sqlx::query(
            r#"
            INSERT INTO debate_sessions (id, config, normalized_question, phase, turns_taken, status,
                                         last_sequence, error, created_at, started_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.config)
        .bind(&row.normalized_question)
        .bind(&row.phase)
        .bind(row.turns_taken)
        .bind(&row.status)
        .bind(row.last_sequence)
        .bind(&row.error)
        .bind(row.created_at)
        .bind(row.started_at)
        .bind(row.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(session.clone())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, DbError> {
        let row: Option<DebateSessionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(DebateSessionRow::into_domain).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<Session>, DbError> {
        let rows: Vec<DebateSessionRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(DebateSessionRow::into_domain).collect()
    }

    /// Sessions whose loop had not finished when last persisted.
    pub async fn find_active(&self) -> Result<Vec<Session>, DbError> {
        let rows: Vec<DebateSessionRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE status IN ('initializing', 'live', 'paused') ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DebateSessionRow::into_domain).collect()
    }

    pub async fn update(&self, session: &Session) -> Result<Session, DbError> {
        let row = DebateSessionRow::try_from(session)?;

        let result = sqlx::query(
            r#"
            UPDATE debate_sessions
            SET normalized_question = ?, phase = ?, turns_taken = ?, status = ?, last_sequence = ?,
                error = ?, started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&row.normalized_question)
        .bind(&row.phase)
        .bind(row.turns_taken)
        .bind(&row.status)
        .bind(row.last_sequence)
        .bind(&row.error)
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(&row.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::SessionNotFound(session.id));
        }

        Ok(session.clone())
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM utterances WHERE session_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM debate_sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_memory_pool, run_migrations};
    use debate_core::{
        Brevity, DebatePhase, HumanSeat, SessionConfig, SessionOption, SessionStatus, Side,
        TimeoutFallback,
    };

    async fn setup_test_db() -> SqlitePool {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn config() -> SessionConfig {
        SessionConfig::new("Cities should ban private cars downtown")
            .with_option(SessionOption::Brevity(Brevity::Short))
            .with_option(SessionOption::Temperature(0.3))
    }

    #[tokio::test]
    async fn test_create_and_find_session() {
        let repo = DebateSessionRepository::new(setup_test_db().await);

        let session = Session::new(config());
        repo.create(&session).await.unwrap();

        let found = repo.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert_eq!(found.status, SessionStatus::Initializing);
        assert_eq!(found.config, session.config);
        assert_eq!(found.settings().brevity, Brevity::Short);
    }

    #[tokio::test]
    async fn test_find_missing_session() {
        let repo = DebateSessionRepository::new(setup_test_db().await);
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_session_progress() {
        let repo = DebateSessionRepository::new(setup_test_db().await);

        let mut session = Session::new(config().with_human(HumanSeat {
            side: Side::Con,
            deadline_secs: Some(30),
            on_timeout: TimeoutFallback::FailSession,
        }));
        repo.create(&session).await.unwrap();

        session.start();
        session.normalized_question = Some("Should downtown cores be car-free?".to_string());
        session.cursor.phase = DebatePhase::Constructive;
        session.cursor.turns_taken = 3;
        session.last_sequence = 6;
        repo.update(&session).await.unwrap();

        let found = repo.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(found.status, SessionStatus::Live);
        assert_eq!(found.phase(), DebatePhase::Constructive);
        assert_eq!(found.cursor.turns_taken, 3);
        assert_eq!(found.last_sequence, 6);
        assert_eq!(found.question(), "Should downtown cores be car-free?");
        assert!(found.started_at.is_some());
        assert_eq!(found.config.human.unwrap().side, Side::Con);
    }

    #[tokio::test]
    async fn test_update_missing_session() {
        let repo = DebateSessionRepository::new(setup_test_db().await);
        let session = Session::new(config());

        let result = repo.update(&session).await;
        assert!(matches!(result, Err(DbError::SessionNotFound(id)) if id == session.id));
    }

    #[tokio::test]
    async fn test_find_active_sessions() {
        let repo = DebateSessionRepository::new(setup_test_db().await);

        let mut live = Session::new(config());
        live.start();
        repo.create(&live).await.unwrap();

        let mut failed = Session::new(config());
        failed.start();
        failed.fail("stopped by operator");
        repo.create(&failed).await.unwrap();

        let active = repo.find_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, live.id);

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let reloaded = all.iter().find(|s| s.id == failed.id).unwrap();
        assert_eq!(reloaded.error.as_deref(), Some("stopped by operator"));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let repo = DebateSessionRepository::new(setup_test_db().await);

        let session = Session::new(config());
        repo.create(&session).await.unwrap();

        assert!(repo.delete(session.id).await.unwrap());
        assert!(repo.find_by_id(session.id).await.unwrap().is_none());
        assert!(!repo.delete(session.id).await.unwrap());
    }
}
