//! Registration and verification tokens.
//!
//! Issued by the registration flow; this side only purges rows that can no
//! longer be redeemed.

pub mod in_memory;
pub mod postgres;

use thiserror::Error;

pub use in_memory::{InMemoryTokenRepository, RegistrationToken, VerificationToken};
pub use postgres::PgTokenRepository;

/// Rows removed by one purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgedTokens {
    pub registration: u64,
    pub verification: u64,
}

impl PurgedTokens {
    pub fn total(&self) -> u64 {
        self.registration + self.verification
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenRepoError {
    #[error("storage error: {0}")]
    Storage(String),
}

#[async_trait::async_trait]
pub trait TokenRepository: Send + Sync {
    /// Delete expired registration tokens plus expired or used verification
    /// tokens, atomically.
    async fn delete_expired(&self) -> Result<PurgedTokens, TokenRepoError>;
}
