use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use serde_json::json;

use haven_auth::AuthContext;

use crate::context::RouteContext;

pub async fn index() -> impl IntoResponse {
    Json(json!({
        "service": "haven",
        "login": "/login",
    }))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(ctx): Extension<AuthContext>,
    Extension(route): Extension<RouteContext>,
) -> impl IntoResponse {
    Json(json!({
        "user_id": ctx.user_id,
        "role": ctx.role.as_str(),
        "initials": ctx.initials,
        "facility_id": ctx.facility_id,
        "facility_code": ctx.facility_code,
        "route": route,
    }))
}
