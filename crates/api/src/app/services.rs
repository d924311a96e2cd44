//! Infrastructure wiring shared by middleware and handlers.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use haven_auth::SecureCookieCodec;
use haven_infra::db::{self, PoolSettings};
use haven_infra::directory::{FacilityDirectory, InMemoryDirectory, PgDirectory, UserDirectory};
use haven_infra::sessions::{
    InMemorySessionRepository, PgSessionRepository, SessionRepoError, SessionRepository,
};
use haven_infra::tokens::{InMemoryTokenRepository, PgTokenRepository, TokenRepository};

use crate::public::PublicRoutes;
use crate::session_store::{CookieOptions, Deadline, SessionStore};

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("database connection failed: {0}")]
    Connect(#[from] sqlx::Error),
    #[error("session schema setup failed: {0}")]
    Schema(#[from] SessionRepoError),
}

/// Storage backends, chosen once at startup.
#[derive(Clone)]
pub struct Backends {
    pub sessions: Arc<dyn SessionRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub facilities: Arc<dyn FacilityDirectory>,
}

impl Backends {
    pub async fn postgres(settings: &PoolSettings) -> Result<Self, ServicesError> {
        let pool = db::connect(settings).await?;

        let sessions = PgSessionRepository::new(pool.clone());
        sessions.ensure_schema().await?;
        let directory = Arc::new(PgDirectory::new(pool.clone()));

        Ok(Self {
            sessions: Arc::new(sessions),
            tokens: Arc::new(PgTokenRepository::new(pool)),
            users: directory.clone(),
            facilities: directory,
        })
    }

    /// Dev/test wiring; callers keep the concrete handles to seed and inspect.
    pub fn in_memory(
        directory: Arc<InMemoryDirectory>,
        sessions: Arc<InMemorySessionRepository>,
        tokens: Arc<InMemoryTokenRepository>,
    ) -> Self {
        Self {
            sessions,
            tokens,
            users: directory.clone(),
            facilities: directory,
        }
    }
}

/// What the request path needs: session store, directory readers, limits.
pub struct AppServices {
    pub sessions: SessionStore,
    pub users: Arc<dyn UserDirectory>,
    pub facilities: Arc<dyn FacilityDirectory>,
    pub public: PublicRoutes,
    pub request_timeout: Duration,
}

impl AppServices {
    pub fn new(
        backends: &Backends,
        codec: SecureCookieCodec,
        cookie: CookieOptions,
        request_timeout: Duration,
    ) -> Self {
        Self {
            sessions: SessionStore::new(backends.sessions.clone(), Arc::new(codec), cookie),
            users: backends.users.clone(),
            facilities: backends.facilities.clone(),
            public: PublicRoutes::portal(),
            request_timeout,
        }
    }

    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}
