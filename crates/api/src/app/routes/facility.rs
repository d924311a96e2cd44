//! Facility-scoped pages.
//!
//! The handlers only describe the resolved request; the gates mounted in
//! [`super::router`] decide who gets here.

use axum::{Json, extract::Extension, response::IntoResponse};
use serde_json::json;

use haven_auth::AuthContext;

use crate::context::RouteContext;

fn snapshot(view: &'static str, ctx: &AuthContext, route: &RouteContext) -> serde_json::Value {
    json!({
        "view": view,
        "user_id": ctx.user_id,
        "role": ctx.role.as_str(),
        "initials": ctx.initials,
        "facility_code": ctx.facility_code,
        "route": route,
    })
}

pub async fn calendar(
    Extension(ctx): Extension<AuthContext>,
    Extension(route): Extension<RouteContext>,
) -> impl IntoResponse {
    Json(snapshot("calendar", &ctx, &route))
}

pub async fn users(
    Extension(ctx): Extension<AuthContext>,
    Extension(route): Extension<RouteContext>,
) -> impl IntoResponse {
    Json(snapshot("users", &ctx, &route))
}

pub async fn profile(
    Extension(ctx): Extension<AuthContext>,
    Extension(route): Extension<RouteContext>,
) -> impl IntoResponse {
    Json(snapshot("profile", &ctx, &route))
}
