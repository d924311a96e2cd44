use thiserror::Error;

use crate::{AuthContext, Role, has_minimum_role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{actual}' is below required '{required}'")]
    InsufficientRole { required: Role, actual: Role },

    #[error("forbidden: facility '{requested}' is outside the caller's scope")]
    FacilityMismatch { requested: String },

    #[error("forbidden: profile '{requested}' belongs to another user")]
    ProfileMismatch { requested: String },
}

/// How a facility-scoped request was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityAccess {
    /// Super users are not confined to a facility.
    Bypass,
    /// The requested facility is the caller's own.
    OwnFacility,
}

/// Require at least `minimum` in the role hierarchy.
///
/// - No IO
/// - No panics
/// - Unknown roles never pass
pub fn authorize_role(ctx: &AuthContext, minimum: &Role) -> Result<(), AuthzError> {
    if has_minimum_role(&ctx.role, minimum) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            required: minimum.clone(),
            actual: ctx.role.clone(),
        })
    }
}

/// Tenant isolation: only super crosses facility boundaries.
///
/// Admins and users are admitted to their own facility only. Whether a user may
/// act on a specific resource inside that facility is decided further down
/// (profile gate or handler).
pub fn authorize_facility(ctx: &AuthContext, requested_code: &str) -> Result<FacilityAccess, AuthzError> {
    let mismatch = || AuthzError::FacilityMismatch {
        requested: requested_code.to_string(),
    };

    match ctx.role {
        Role::Super => Ok(FacilityAccess::Bypass),
        Role::Admin | Role::User => match ctx.facility_code() {
            Some(own) if !own.is_empty() && own == requested_code => Ok(FacilityAccess::OwnFacility),
            _ => Err(mismatch()),
        },
        Role::Unknown(_) => Err(mismatch()),
    }
}

/// Own-profile rule: admins and supers may view any profile in scope, users only their own.
pub fn authorize_profile(ctx: &AuthContext, requested_initials: &str) -> Result<(), AuthzError> {
    match ctx.role {
        Role::Super | Role::Admin => Ok(()),
        Role::User if !ctx.initials.is_empty() && ctx.initials == requested_initials => Ok(()),
        _ => Err(AuthzError::ProfileMismatch {
            requested: requested_initials.to_string(),
        }),
    }
}
