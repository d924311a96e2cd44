use chrono::{DateTime, Utc};
use thiserror::Error;

/// A persisted session row.
///
/// The payload is opaque bytes to this layer; the auth crate owns its shape.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub key: String,
    pub payload: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl core::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("key", &"<redacted>")
            .field("payload_len", &self.payload.len())
            .field("created_at", &self.created_at)
            .field("modified_at", &self.modified_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Write request for [`SessionRepository::save`].
///
/// `is_new` selects INSERT (fails on key collision) over UPDATE (fails when
/// the row is gone).
#[derive(Clone)]
pub struct SaveSession {
    pub key: String,
    pub payload: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub is_new: bool,
}

impl core::fmt::Debug for SaveSession {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SaveSession")
            .field("payload_len", &self.payload.len())
            .field("expires_at", &self.expires_at)
            .field("is_new", &self.is_new)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionRepoError {
    #[error("session not found")]
    NotFound,
    #[error("session key already exists")]
    AlreadyExists,
    #[error("storage error: {0}")]
    Storage(String),
}

/// Persistence for opaque session payloads keyed by an opaque token.
#[async_trait::async_trait]
pub trait SessionRepository: Send + Sync {
    /// Idempotent DDL for the backing table.
    async fn ensure_schema(&self) -> Result<(), SessionRepoError>;

    async fn save(&self, session: SaveSession) -> Result<(), SessionRepoError>;

    /// Rows past `expires_at` are reported as [`SessionRepoError::NotFound`].
    async fn load(&self, key: &str) -> Result<SessionRecord, SessionRepoError>;

    /// Deleting a missing key is not an error.
    async fn destroy(&self, key: &str) -> Result<(), SessionRepoError>;

    /// Remove every expired row; returns how many were deleted.
    async fn delete_expired(&self) -> Result<u64, SessionRepoError>;
}
