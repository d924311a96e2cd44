//! `haven-auth` — pure authentication/authorization boundary.
//!
//! No HTTP and no storage here: role hierarchy, session payload shape, the
//! per-request auth context, authorization policy, the cookie codec and
//! password verification.

pub mod authorize;
pub mod codec;
pub mod password;
pub mod payload;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, FacilityAccess, authorize_facility, authorize_profile, authorize_role};
pub use codec::{CodecError, KeyPair, SecureCookieCodec, generate_random_key};
pub use password::{PasswordError, hash_password, verify_password};
pub use payload::{IdentityError, SessionIdentity, SessionPayload};
pub use principal::AuthContext;
pub use roles::{Role, has_minimum_role, has_minimum_role_str};
