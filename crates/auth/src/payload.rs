use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use haven_core::{FacilityId, UserId};

use crate::Role;

/// Server-side session payload (never sent to the browser).
///
/// Anonymous sessions carry no identity. The payload is stored as JSON; a row
/// whose bytes do not deserialize into this shape is a malformed identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<SessionIdentity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<DateTime<Utc>>,
}

/// Identity snapshot written on login and rewritten on every authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: UserId,
    pub role: Role,
    #[serde(default)]
    pub initials: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<FacilityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_code: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("session carries no identity")]
    Missing,

    #[error("session identity has no usable user id")]
    InvalidUserId,

    #[error("session payload is malformed: {0}")]
    Malformed(String),
}

impl SessionPayload {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        serde_json::from_slice(bytes).map_err(|e| IdentityError::Malformed(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, IdentityError> {
        serde_json::to_vec(self).map_err(|e| IdentityError::Malformed(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.identity.is_none() && self.last_access.is_none()
    }

    /// Strict identity extraction: a zero or missing user id means "no session".
    pub fn identity(&self) -> Result<&SessionIdentity, IdentityError> {
        let identity = self.identity.as_ref().ok_or(IdentityError::Missing)?;
        if !identity.user_id.is_valid() {
            return Err(IdentityError::InvalidUserId);
        }
        Ok(identity)
    }

    /// Replace the identity and stamp the access time.
    pub fn refresh(&mut self, identity: SessionIdentity, now: DateTime<Utc>) {
        self.identity = Some(identity);
        self.last_access = Some(now);
    }

    pub fn clear(&mut self) {
        self.identity = None;
        self.last_access = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user_id: i64) -> SessionIdentity {
        SessionIdentity {
            user_id: UserId::new(user_id),
            role: Role::Admin,
            initials: "JD".to_string(),
            facility_id: Some(FacilityId::new(3)),
            facility_code: Some("kabc".to_string()),
        }
    }

    #[test]
    fn empty_payload_has_no_identity() {
        let payload = SessionPayload::default();
        assert!(payload.is_empty());
        assert_eq!(payload.identity(), Err(IdentityError::Missing));
    }

    #[test]
    fn zero_user_id_is_rejected() {
        let mut payload = SessionPayload::default();
        payload.refresh(identity(0), Utc::now());
        assert_eq!(payload.identity(), Err(IdentityError::InvalidUserId));
    }

    #[test]
    fn stored_bytes_round_trip() {
        let mut payload = SessionPayload::default();
        payload.refresh(identity(9), Utc::now());
        let bytes = payload.to_bytes().unwrap();
        let back = SessionPayload::from_bytes(&bytes).unwrap();
        assert_eq!(back, payload);
        assert_eq!(back.identity().unwrap().user_id, UserId::new(9));
    }

    #[test]
    fn wrongly_typed_fields_are_malformed() {
        let bytes = br#"{"identity":{"user_id":"9","role":"admin"}}"#;
        assert!(matches!(
            SessionPayload::from_bytes(bytes),
            Err(IdentityError::Malformed(_))
        ));

        let bytes = br#"{"identity":{"user_id":9,"role":7}}"#;
        assert!(matches!(
            SessionPayload::from_bytes(bytes),
            Err(IdentityError::Malformed(_))
        ));
    }

    #[test]
    fn optional_fields_default_when_absent() {
        let bytes = br#"{"identity":{"user_id":4,"role":"user"}}"#;
        let payload = SessionPayload::from_bytes(bytes).unwrap();
        let identity = payload.identity().unwrap();
        assert_eq!(identity.initials, "");
        assert_eq!(identity.facility_code, None);
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn clear_drops_identity() {
        let mut payload = SessionPayload::default();
        payload.refresh(identity(2), Utc::now());
        payload.clear();
        assert!(payload.is_empty());
    }
}
