//! Read-only access to the user and facility tables.
//!
//! The auth path only ever reads these rows; they are owned by the
//! registration and administration flows.

pub mod in_memory;
pub mod postgres;

use thiserror::Error;

use haven_auth::Role;
use haven_core::{FacilityId, UserId};

pub use in_memory::InMemoryDirectory;
pub use postgres::PgDirectory;

#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub facility_id: Option<FacilityId>,
    pub initials: String,
    pub email: String,
    pub role: Role,
    /// argon2 PHC string.
    pub password_hash: String,
}

impl core::fmt::Debug for User {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("facility_id", &self.facility_id)
            .field("initials", &self.initials)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facility {
    pub id: FacilityId,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("record not found")]
    NotFound,
    #[error("directory backend error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_id(&self, id: UserId) -> Result<User, DirectoryError>;

    /// Exact match on the stored email.
    async fn get_user_by_email(&self, email: &str) -> Result<User, DirectoryError>;
}

#[async_trait::async_trait]
pub trait FacilityDirectory: Send + Sync {
    async fn get_facility_by_id(&self, id: FacilityId) -> Result<Facility, DirectoryError>;
}
