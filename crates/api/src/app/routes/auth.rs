//! Login and logout.
//!
//! Both are on the public allowlist, so they resolve the session themselves
//! instead of relying on the auth middleware.

use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use haven_auth::{AuthContext, PasswordError, verify_password};
use haven_infra::directory::DirectoryError;

use crate::app::{errors, services::AppServices};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login_page() -> impl IntoResponse {
    Json(json!({
        "form": "login",
        "fields": ["email", "password"],
    }))
}

fn invalid_credentials() -> Response {
    errors::json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid email or password")
}

fn login_failed() -> Response {
    errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "login_failed", "login is temporarily unavailable")
}

pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Response {
    let deadline = services.deadline();
    let email = req.email.trim();

    let user = match deadline.run(services.users.get_user_by_email(email)).await {
        Ok(Ok(user)) => user,
        Ok(Err(DirectoryError::NotFound)) => return invalid_credentials(),
        Ok(Err(err)) => {
            error!(error = %err, "user lookup failed during login");
            return login_failed();
        }
        Err(elapsed) => {
            error!(error = %elapsed, "user lookup timed out during login");
            return login_failed();
        }
    };

    let phc = user.password_hash.clone();
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &phc)).await;
    match verified {
        Ok(Ok(())) => {}
        Ok(Err(PasswordError::Mismatch)) => return invalid_credentials(),
        Ok(Err(err)) => {
            warn!(user_id = %user.id, error = %err, "stored password hash unusable");
            return invalid_credentials();
        }
        Err(err) => {
            error!(error = %err, "password verification task failed");
            return login_failed();
        }
    }

    let facility = match user.facility_id {
        Some(facility_id) => match deadline.run(services.facilities.get_facility_by_id(facility_id)).await {
            Ok(Ok(facility)) => Some(facility),
            Ok(Err(DirectoryError::NotFound)) => None,
            Ok(Err(err)) => {
                error!(error = %err, "facility lookup failed during login");
                return login_failed();
            }
            Err(elapsed) => {
                error!(error = %elapsed, "facility lookup timed out during login");
                return login_failed();
            }
        },
        None => None,
    };

    // Rotate: the pre-login key never carries an identity.
    let previous = services.sessions.get(&headers, deadline).await;
    if let Some(key) = previous.key() {
        if let Err(err) = services.sessions.destroy(key, deadline).await {
            error!(error = %err, "failed to destroy pre-login session");
            return login_failed();
        }
    }

    let ctx = AuthContext {
        user_id: user.id,
        role: user.role,
        initials: user.initials,
        facility_id: facility.as_ref().map(|f| f.id),
        facility_code: facility.map(|f| f.code),
    };

    let mut session = services.sessions.new_session();
    session.payload.refresh(ctx.to_identity(), Utc::now());
    let cookie = match services.sessions.save(&mut session, deadline).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!(error = %err, "failed to persist session at login");
            return login_failed();
        }
    };

    info!(user_id = %ctx.user_id, role = %ctx.role, "login succeeded");

    let redirect = match ctx.facility_code() {
        Some(code) if !code.is_empty() => format!("/facility/{code}/calendar"),
        _ => "/".to_string(),
    };
    (cookie, Json(json!({ "redirect": redirect }))).into_response()
}

pub async fn logout(Extension(services): Extension<Arc<AppServices>>, headers: HeaderMap) -> Response {
    let deadline = services.deadline();
    let mut session = services.sessions.get(&headers, deadline).await;
    session.mark_for_removal();

    let cookie = match services.sessions.save(&mut session, deadline).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!(error = %err, "failed to destroy session at logout");
            services.sessions.expired_cookie()
        }
    };

    let mut res = Redirect::to("/login").into_response();
    let res_headers = res.headers_mut();
    cookie.append_to(res_headers);
    res_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache, must-revalidate"));
    res_headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    res_headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    res
}
