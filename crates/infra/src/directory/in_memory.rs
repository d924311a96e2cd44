use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use haven_core::{FacilityId, UserId};

use super::{DirectoryError, Facility, FacilityDirectory, User, UserDirectory};

/// In-memory directory for tests/dev. Writes take effect on the next read.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, User>>,
    facilities: RwLock<HashMap<FacilityId, Facility>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn upsert_user(&self, user: User) {
        if let Ok(mut users) = self.users.write() {
            users.insert(user.id, user);
        }
    }

    pub fn remove_user(&self, id: UserId) {
        if let Ok(mut users) = self.users.write() {
            users.remove(&id);
        }
    }

    pub fn upsert_facility(&self, facility: Facility) {
        if let Ok(mut facilities) = self.facilities.write() {
            facilities.insert(facility.id, facility);
        }
    }
}

fn poisoned<T>(_: T) -> DirectoryError {
    DirectoryError::Backend("directory lock poisoned".to_string())
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn get_user_by_id(&self, id: UserId) -> Result<User, DirectoryError> {
        let users = self.users.read().map_err(poisoned)?;
        users.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        let users = self.users.read().map_err(poisoned)?;
        users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }
}

#[async_trait::async_trait]
impl FacilityDirectory for InMemoryDirectory {
    async fn get_facility_by_id(&self, id: FacilityId) -> Result<Facility, DirectoryError> {
        let facilities = self.facilities.read().map_err(poisoned)?;
        facilities.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }
}
