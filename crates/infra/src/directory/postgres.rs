use std::sync::Arc;

use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use haven_auth::Role;
use haven_core::{FacilityId, UserId};

use super::{DirectoryError, Facility, FacilityDirectory, User, UserDirectory};

/// Postgres reader over `users` and `facilities`.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: Arc<PgPool>,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

const USER_COLUMNS: &str = "id, facility_id, initials, email, role, password";

fn user_from_row(row: &PgRow) -> Result<User, DirectoryError> {
    let read = |e: sqlx::Error| DirectoryError::Backend(format!("failed to read user row: {e}"));
    Ok(User {
        id: UserId::new(row.try_get::<i64, _>("id").map_err(read)?),
        facility_id: row
            .try_get::<Option<i64>, _>("facility_id")
            .map_err(read)?
            .map(FacilityId::new),
        initials: row.try_get::<String, _>("initials").map_err(read)?,
        email: row.try_get::<String, _>("email").map_err(read)?,
        role: Role::parse(&row.try_get::<String, _>("role").map_err(read)?),
        password_hash: row.try_get::<String, _>("password").map_err(read)?,
    })
}

fn backend(operation: &str, err: sqlx::Error) -> DirectoryError {
    DirectoryError::Backend(format!("{operation}: {err}"))
}

#[async_trait::async_trait]
impl UserDirectory for PgDirectory {
    #[instrument(skip(self), fields(user_id = %id))]
    async fn get_user_by_id(&self, id: UserId) -> Result<User, DirectoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| backend("get_user_by_id", e))?
            .ok_or(DirectoryError::NotFound)?;
        user_from_row(&row)
    }

    #[instrument(skip(self, email))]
    async fn get_user_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| backend("get_user_by_email", e))?
            .ok_or(DirectoryError::NotFound)?;
        user_from_row(&row)
    }
}

#[async_trait::async_trait]
impl FacilityDirectory for PgDirectory {
    #[instrument(skip(self), fields(facility_id = %id))]
    async fn get_facility_by_id(&self, id: FacilityId) -> Result<Facility, DirectoryError> {
        let row = sqlx::query("SELECT id, code FROM facilities WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| backend("get_facility_by_id", e))?
            .ok_or(DirectoryError::NotFound)?;

        let read = |e: sqlx::Error| DirectoryError::Backend(format!("failed to read facility row: {e}"));
        Ok(Facility {
            id: FacilityId::new(row.try_get::<i64, _>("id").map_err(read)?),
            code: row.try_get::<String, _>("code").map_err(read)?,
        })
    }
}
