use std::sync::Arc;

use sqlx::PgPool;
use tracing::{Span, instrument};

use super::{PurgedTokens, TokenRepoError, TokenRepository};

#[derive(Debug, Clone)]
pub struct PgTokenRepository {
    pool: Arc<PgPool>,
}

impl PgTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn storage(operation: &str, err: sqlx::Error) -> TokenRepoError {
    TokenRepoError::Storage(format!("{operation}: {err}"))
}

#[async_trait::async_trait]
impl TokenRepository for PgTokenRepository {
    #[instrument(
        skip(self),
        fields(
            registration = tracing::field::Empty,
            verification = tracing::field::Empty
        ),
        err
    )]
    async fn delete_expired(&self) -> Result<PurgedTokens, TokenRepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage("begin_transaction", e))?;

        let registration = sqlx::query("DELETE FROM registration_tokens WHERE expires_at < now()")
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("delete_registration_tokens", e))?
            .rows_affected();

        let verification =
            sqlx::query("DELETE FROM verification_tokens WHERE expires_at < now() OR used = true")
                .execute(&mut *tx)
                .await
                .map_err(|e| storage("delete_verification_tokens", e))?
                .rows_affected();

        tx.commit().await.map_err(|e| storage("commit_transaction", e))?;

        let span = Span::current();
        span.record("registration", registration);
        span.record("verification", verification);
        Ok(PurgedTokens {
            registration,
            verification,
        })
    }
}
