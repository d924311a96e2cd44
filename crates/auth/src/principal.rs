use serde::Serialize;

use haven_core::{FacilityId, UserId};

use crate::{Role, SessionIdentity};

/// Per-request identity snapshot.
///
/// Built fresh on every authenticated request from the user and facility rows;
/// never persisted on its own and never shared between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: Role,
    pub initials: String,
    pub facility_id: Option<FacilityId>,
    pub facility_code: Option<String>,
}

impl AuthContext {
    pub fn facility_code(&self) -> Option<&str> {
        self.facility_code.as_deref()
    }

    /// Identity to write back into the session payload.
    pub fn to_identity(&self) -> SessionIdentity {
        SessionIdentity {
            user_id: self.user_id,
            role: self.role.clone(),
            initials: self.initials.clone(),
            facility_id: self.facility_id,
            facility_code: self.facility_code.clone(),
        }
    }
}

impl From<SessionIdentity> for AuthContext {
    fn from(identity: SessionIdentity) -> Self {
        Self {
            user_id: identity.user_id,
            role: identity.role,
            initials: identity.initials,
            facility_id: identity.facility_id,
            facility_code: identity.facility_code,
        }
    }
}
