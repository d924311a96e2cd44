use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::{PurgedTokens, TokenRepoError, TokenRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// In-memory token tables for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTokenRepository {
    tables: RwLock<(Vec<RegistrationToken>, Vec<VerificationToken>)>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert_registration(&self, token: RegistrationToken) {
        if let Ok(mut tables) = self.tables.write() {
            tables.0.push(token);
        }
    }

    pub fn insert_verification(&self, token: VerificationToken) {
        if let Ok(mut tables) = self.tables.write() {
            tables.1.push(token);
        }
    }

    /// `(registration, verification)` row counts.
    pub fn counts(&self) -> (usize, usize) {
        self.tables
            .read()
            .map(|tables| (tables.0.len(), tables.1.len()))
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn delete_expired(&self) -> Result<PurgedTokens, TokenRepoError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| TokenRepoError::Storage("token lock poisoned".to_string()))?;
        let now = Utc::now();
        let (registration, verification) = &mut *tables;

        let before = registration.len();
        registration.retain(|t| t.expires_at >= now);
        let purged_registration = (before - registration.len()) as u64;

        let before = verification.len();
        verification.retain(|t| t.expires_at >= now && !t.used);
        let purged_verification = (before - verification.len()) as u64;

        Ok(PurgedTokens {
            registration: purged_registration,
            verification: purged_verification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn purges_expired_and_used_tokens_only() {
        let repo = InMemoryTokenRepository::new();
        let now = Utc::now();
        repo.insert_registration(RegistrationToken {
            token: "r-old".into(),
            expires_at: now - Duration::minutes(1),
        });
        repo.insert_registration(RegistrationToken {
            token: "r-live".into(),
            expires_at: now + Duration::hours(1),
        });
        repo.insert_verification(VerificationToken {
            token: "v-used".into(),
            expires_at: now + Duration::hours(1),
            used: true,
        });
        repo.insert_verification(VerificationToken {
            token: "v-old".into(),
            expires_at: now - Duration::minutes(1),
            used: false,
        });
        repo.insert_verification(VerificationToken {
            token: "v-live".into(),
            expires_at: now + Duration::hours(1),
            used: false,
        });

        let purged = repo.delete_expired().await.unwrap();
        assert_eq!(
            purged,
            PurgedTokens {
                registration: 1,
                verification: 2
            }
        );
        assert_eq!(purged.total(), 3);
        assert_eq!(repo.counts(), (1, 1));
    }
}
