use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;

use super::{SaveSession, SessionRecord, SessionRepoError, SessionRepository};

/// In-memory session repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySessionRepository {
    rows: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Rows currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> SessionRepoError {
    SessionRepoError::Storage("session map lock poisoned".to_string())
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn ensure_schema(&self) -> Result<(), SessionRepoError> {
        Ok(())
    }

    async fn save(&self, session: SaveSession) -> Result<(), SessionRepoError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let now = Utc::now();

        if session.is_new {
            if rows.contains_key(&session.key) {
                return Err(SessionRepoError::AlreadyExists);
            }
            rows.insert(
                session.key.clone(),
                SessionRecord {
                    key: session.key,
                    payload: session.payload,
                    created_at: now,
                    modified_at: now,
                    expires_at: session.expires_at,
                },
            );
            return Ok(());
        }

        let row = rows.get_mut(&session.key).ok_or(SessionRepoError::NotFound)?;
        row.payload = session.payload;
        row.modified_at = now;
        row.expires_at = session.expires_at;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<SessionRecord, SessionRepoError> {
        let rows = self.rows.read().map_err(poisoned)?;
        match rows.get(key) {
            Some(row) if row.expires_at > Utc::now() => Ok(row.clone()),
            _ => Err(SessionRepoError::NotFound),
        }
    }

    async fn destroy(&self, key: &str) -> Result<(), SessionRepoError> {
        self.rows.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, SessionRepoError> {
        let mut rows = self.rows.write().map_err(poisoned)?;
        let now = Utc::now();
        let before = rows.len();
        rows.retain(|_, row| row.expires_at > now);
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn save(key: &str, payload: &[u8], ttl: Duration, is_new: bool) -> SaveSession {
        SaveSession {
            key: key.to_string(),
            payload: payload.to_vec(),
            expires_at: Utc::now() + ttl,
            is_new,
        }
    }

    #[tokio::test]
    async fn insert_then_update_keeps_one_row() {
        let repo = InMemorySessionRepository::new();
        repo.save(save("k1", b"one", Duration::hours(1), true)).await.unwrap();
        repo.save(save("k1", b"two", Duration::hours(1), false)).await.unwrap();

        assert_eq!(repo.len(), 1);
        let row = repo.load("k1").await.unwrap();
        assert_eq!(row.payload, b"two");
        assert!(row.modified_at >= row.created_at);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let repo = InMemorySessionRepository::new();
        repo.save(save("k1", b"a", Duration::hours(1), true)).await.unwrap();
        assert_eq!(
            repo.save(save("k1", b"b", Duration::hours(1), true)).await,
            Err(SessionRepoError::AlreadyExists)
        );
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let repo = InMemorySessionRepository::new();
        assert_eq!(
            repo.save(save("gone", b"a", Duration::hours(1), false)).await,
            Err(SessionRepoError::NotFound)
        );
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn expired_rows_are_invisible_and_swept() {
        let repo = InMemorySessionRepository::new();
        repo.save(save("old", b"a", Duration::seconds(-5), true)).await.unwrap();
        repo.save(save("live", b"b", Duration::hours(1), true)).await.unwrap();

        assert_eq!(repo.load("old").await, Err(SessionRepoError::NotFound));
        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert_eq!(repo.len(), 1);
        assert!(repo.load("live").await.is_ok());
    }

    #[tokio::test]
    async fn destroy_is_idempotent() {
        let repo = InMemorySessionRepository::new();
        repo.save(save("k", b"a", Duration::hours(1), true)).await.unwrap();
        repo.destroy("k").await.unwrap();
        repo.destroy("k").await.unwrap();
        assert_eq!(repo.load("k").await, Err(SessionRepoError::NotFound));
    }
}
