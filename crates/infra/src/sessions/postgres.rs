//! Postgres-backed session repository (`http_sessions`).
//!
//! Expiry is enforced in SQL: `load` filters on `expires_at > now()`, so a row
//! that is present but stale cannot be told apart from a missing one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use super::{SaveSession, SessionRecord, SessionRepoError, SessionRepository};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS http_sessions (
    id          BIGSERIAL PRIMARY KEY,
    key         TEXT NOT NULL UNIQUE,
    data        BYTEA NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    modified_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    expires_at  TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_EXPIRY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS http_sessions_expires_at_idx ON http_sessions (expires_at)";

#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: Arc<PgPool>,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait::async_trait]
impl SessionRepository for PgSessionRepository {
    #[instrument(skip(self), err)]
    async fn ensure_schema(&self) -> Result<(), SessionRepoError> {
        sqlx::query(CREATE_TABLE)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_sessions_table", e))?;
        sqlx::query(CREATE_EXPIRY_INDEX)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_sessions_index", e))?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(is_new = session.is_new, payload_len = session.payload.len()), err)]
    async fn save(&self, session: SaveSession) -> Result<(), SessionRepoError> {
        if session.is_new {
            sqlx::query(
                r#"
                INSERT INTO http_sessions (key, data, created_at, modified_at, expires_at)
                VALUES ($1, $2, now(), now(), $3)
                "#,
            )
            .bind(&session.key)
            .bind(&session.payload)
            .bind(session.expires_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_session", e))?;
            return Ok(());
        }

        let result = sqlx::query(
            r#"
            UPDATE http_sessions
            SET data = $2, modified_at = now(), expires_at = $3
            WHERE key = $1
            "#,
        )
        .bind(&session.key)
        .bind(&session.payload)
        .bind(session.expires_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_session", e))?;

        if result.rows_affected() == 0 {
            return Err(SessionRepoError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, key))]
    async fn load(&self, key: &str) -> Result<SessionRecord, SessionRepoError> {
        let row = sqlx::query(
            r#"
            SELECT key, data, created_at, modified_at, expires_at
            FROM http_sessions
            WHERE key = $1 AND expires_at > now()
            "#,
        )
        .bind(key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_session", e))?
        .ok_or(SessionRepoError::NotFound)?;

        let read = |e: sqlx::Error| SessionRepoError::Storage(format!("failed to read session row: {e}"));
        Ok(SessionRecord {
            key: row.try_get::<String, _>("key").map_err(read)?,
            payload: row.try_get::<Vec<u8>, _>("data").map_err(read)?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(read)?,
            modified_at: row.try_get::<DateTime<Utc>, _>("modified_at").map_err(read)?,
            expires_at: row.try_get::<DateTime<Utc>, _>("expires_at").map_err(read)?,
        })
    }

    #[instrument(skip(self, key), err)]
    async fn destroy(&self, key: &str) -> Result<(), SessionRepoError> {
        sqlx::query("DELETE FROM http_sessions WHERE key = $1")
            .bind(key)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("destroy_session", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(deleted = tracing::field::Empty), err)]
    async fn delete_expired(&self) -> Result<u64, SessionRepoError> {
        let result = sqlx::query("DELETE FROM http_sessions WHERE expires_at <= now()")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_expired_sessions", e))?;

        Span::current().record("deleted", result.rows_affected());
        Ok(result.rows_affected())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> SessionRepoError {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            SessionRepoError::AlreadyExists
        }
        sqlx::Error::Database(db_err) => {
            SessionRepoError::Storage(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolTimedOut => SessionRepoError::Storage(format!("pool timed out in {operation}")),
        other => SessionRepoError::Storage(format!("{operation}: {other}")),
    }
}
