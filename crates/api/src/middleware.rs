//! Session resolution and authorization gates.
//!
//! `auth_middleware` wraps the whole router and resolves the caller on every
//! non-public request. The gates are route layers that read what it left in
//! the request extensions (plus the [`RouteContext`]).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, warn};

use haven_auth::{
    AuthContext, IdentityError, Role, authorize_facility, authorize_profile, authorize_role,
};
use haven_infra::directory::DirectoryError;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::{FACILITY_PARAM, INITIALS_PARAM, RouteContext};
use crate::session_store::{Deadline, DeadlineElapsed, Session, SetCookie};

/// Why a request ended up without an identity.
#[derive(Debug, Error)]
enum ResolveError {
    #[error("no usable session identity: {0}")]
    NoIdentity(#[from] IdentityError),
    #[error("session user no longer exists")]
    UserGone,
    #[error("backend unavailable: {0}")]
    Backend(String),
}

impl From<DeadlineElapsed> for ResolveError {
    fn from(err: DeadlineElapsed) -> Self {
        ResolveError::Backend(err.to_string())
    }
}

impl ResolveError {
    /// True when the stored session can never authenticate again.
    fn is_stale(&self) -> bool {
        !matches!(self, ResolveError::Backend(_))
    }
}

pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    if services.public.is_public(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let deadline = services.deadline();
    let mut session = services.sessions.get(req.headers(), deadline).await;

    let ctx = match resolve(&services, &mut session, deadline).await {
        Ok(ctx) => ctx,
        Err(err) => {
            let mut res = errors::unauthenticated(req.headers());
            if let Some(cookie) = reject(&services, &mut session, req.headers(), deadline, &err).await {
                cookie.append_to(res.headers_mut());
            }
            return res;
        }
    };

    let cookie = match services.sessions.save(&mut session, deadline).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!(error = %err, "session refresh failed; treating request as unauthenticated");
            return errors::unauthenticated(req.headers());
        }
    };

    req.extensions_mut().insert(ctx);
    let mut res = next.run(req).await;
    cookie.append_to(res.headers_mut());
    res
}

/// Log a failed resolution and, for stale sessions, drop the row and expire the cookie.
async fn reject(
    services: &AppServices,
    session: &mut Session,
    headers: &HeaderMap,
    deadline: Deadline,
    err: &ResolveError,
) -> Option<SetCookie> {
    if !err.is_stale() {
        error!(reason = %err, "identity refresh failed; treating request as unauthenticated");
        return None;
    }
    debug!(reason = %err, "unauthenticated request");

    if session.key().is_none() && !services.sessions.has_cookie(headers) {
        return None;
    }
    session.mark_for_removal();
    match services.sessions.save(session, deadline).await {
        Ok(cookie) => Some(cookie),
        Err(err) => {
            error!(error = %err, "failed to destroy stale session");
            Some(services.sessions.expired_cookie())
        }
    }
}

/// Re-read user and facility, then rewrite the session identity.
async fn resolve(
    services: &AppServices,
    session: &mut Session,
    deadline: Deadline,
) -> Result<AuthContext, ResolveError> {
    let user_id = session.payload.identity()?.user_id;

    let user = match deadline.run(services.users.get_user_by_id(user_id)).await? {
        Ok(user) => user,
        Err(DirectoryError::NotFound) => return Err(ResolveError::UserGone),
        Err(DirectoryError::Backend(msg)) => return Err(ResolveError::Backend(msg)),
    };

    let facility = match user.facility_id {
        Some(facility_id) => match deadline.run(services.facilities.get_facility_by_id(facility_id)).await? {
            Ok(facility) => Some(facility),
            Err(DirectoryError::NotFound) => {
                warn!(user_id = %user.id, facility_id = %facility_id, "user references a missing facility");
                None
            }
            Err(DirectoryError::Backend(msg)) => return Err(ResolveError::Backend(msg)),
        },
        None => None,
    };

    let ctx = AuthContext {
        user_id: user.id,
        role: user.role,
        initials: user.initials,
        facility_id: facility.as_ref().map(|f| f.id),
        facility_code: facility.map(|f| f.code),
    };
    session.payload.refresh(ctx.to_identity(), Utc::now());
    Ok(ctx)
}

/// Gate: caller's role must be at least the state's role.
///
/// Mount with `from_fn_with_state(Role::Admin, require_role)`.
pub async fn require_role(State(minimum): State<Role>, req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<AuthContext>() else {
        return errors::unauthenticated(req.headers());
    };

    if let Err(err) = authorize_role(ctx, &minimum) {
        warn!(user_id = %ctx.user_id, path = %req.uri().path(), error = %err, "access denied");
        return errors::forbidden();
    }
    next.run(req).await
}

/// Gate: tenant isolation on the `facility_code` route parameter.
pub async fn validate_facility(req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<AuthContext>() else {
        return errors::unauthenticated(req.headers());
    };
    let Some(code) = req.extensions().get::<RouteContext>().and_then(|r| r.facility_code()) else {
        return errors::missing_param(FACILITY_PARAM);
    };

    if let Err(err) = authorize_facility(ctx, code) {
        warn!(user_id = %ctx.user_id, path = %req.uri().path(), error = %err, "access denied");
        return errors::forbidden();
    }
    next.run(req).await
}

/// Gate: users may only open their own profile; admins and supers pass.
pub async fn require_profile_access(req: Request, next: Next) -> Response {
    let Some(ctx) = req.extensions().get::<AuthContext>() else {
        return errors::unauthenticated(req.headers());
    };
    let Some(initials) = req.extensions().get::<RouteContext>().and_then(|r| r.user_initials()) else {
        return errors::missing_param(INITIALS_PARAM);
    };

    if let Err(err) = authorize_profile(ctx, initials) {
        warn!(user_id = %ctx.user_id, path = %req.uri().path(), error = %err, "access denied");
        return errors::forbidden();
    }
    next.run(req).await
}

/// Sends callers whose session still resolves to a facility to their calendar.
///
/// Stale sessions are cleared so the login form is reachable again.
pub async fn redirect_authenticated(
    State(services): State<Arc<AppServices>>,
    req: Request,
    next: Next,
) -> Response {
    let deadline = services.deadline();
    let mut session = services.sessions.get(req.headers(), deadline).await;

    match resolve(&services, &mut session, deadline).await {
        Ok(ctx) => match ctx.facility_code() {
            Some(code) if !code.is_empty() => Redirect::to(&format!("/facility/{code}/calendar")).into_response(),
            _ => next.run(req).await,
        },
        Err(err) => {
            let cleared = reject(&services, &mut session, req.headers(), deadline, &err).await;
            let mut res = next.run(req).await;
            if let Some(cookie) = cleared {
                cookie.append_to(res.headers_mut());
            }
            res
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode, header},
        middleware::{from_fn, from_fn_with_state},
        routing::get,
    };
    use haven_core::{FacilityId, UserId};
    use tower::ServiceExt;

    use crate::context::route_context;

    fn ctx(role: Role, code: &str, initials: &str) -> AuthContext {
        AuthContext {
            user_id: UserId::new(1),
            role,
            initials: initials.to_string(),
            facility_id: Some(FacilityId::new(1)),
            facility_code: Some(code.to_string()),
        }
    }

    async fn status(app: Router, uri: &str) -> StatusCode {
        let req = HttpRequest::builder()
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    fn admin_only(caller: Option<AuthContext>) -> Router {
        let app = Router::new()
            .route("/admin", get(|| async { "ok" }))
            .route_layer(from_fn_with_state(Role::Admin, require_role));
        match caller {
            Some(caller) => app.layer(Extension(caller)),
            None => app,
        }
    }

    fn facility_scoped(caller: AuthContext) -> Router {
        let profile = Router::new()
            .route("/facility/:facility_code/users/:user_initials", get(|| async { "ok" }))
            .route_layer(from_fn(require_profile_access));

        Router::new()
            .route("/facility/:facility_code/calendar", get(|| async { "ok" }))
            .route("/unscoped", get(|| async { "ok" }))
            .merge(profile)
            .route_layer(from_fn(validate_facility))
            .route_layer(from_fn(route_context))
            .layer(Extension(caller))
    }

    #[tokio::test]
    async fn role_gate() {
        assert_eq!(status(admin_only(Some(ctx(Role::User, "kabc", "JD"))), "/admin").await, StatusCode::FORBIDDEN);
        assert_eq!(status(admin_only(Some(ctx(Role::Admin, "kabc", "JD"))), "/admin").await, StatusCode::OK);
        assert_eq!(status(admin_only(Some(ctx(Role::Super, "kabc", "JD"))), "/admin").await, StatusCode::OK);
        assert_eq!(status(admin_only(None), "/admin").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn facility_gate_enforces_tenant_isolation() {
        let admin = || facility_scoped(ctx(Role::Admin, "kabc", "AD"));
        assert_eq!(status(admin(), "/facility/kabc/calendar").await, StatusCode::OK);
        assert_eq!(status(admin(), "/facility/kxyz/calendar").await, StatusCode::FORBIDDEN);

        let user = || facility_scoped(ctx(Role::User, "kabc", "JD"));
        assert_eq!(status(user(), "/facility/kabc/calendar").await, StatusCode::OK);
        assert_eq!(status(user(), "/facility/kxyz/calendar").await, StatusCode::FORBIDDEN);

        let root = facility_scoped(ctx(Role::Super, "hq", "SU"));
        assert_eq!(status(root, "/facility/kxyz/calendar").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn gates_without_route_params_are_bad_requests() {
        let app = facility_scoped(ctx(Role::Super, "hq", "SU"));
        assert_eq!(status(app, "/unscoped").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn users_only_reach_their_own_profile() {
        let user = || facility_scoped(ctx(Role::User, "kabc", "JD"));
        assert_eq!(status(user(), "/facility/kabc/users/JD").await, StatusCode::OK);
        assert_eq!(status(user(), "/facility/kabc/users/MK").await, StatusCode::FORBIDDEN);

        let admin = facility_scoped(ctx(Role::Admin, "kabc", "AD"));
        assert_eq!(status(admin, "/facility/kabc/users/MK").await, StatusCode::OK);
    }
}
