use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Redirect, Response};
use serde_json::json;

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// API-style callers (JSON or XHR) get status codes instead of redirects.
pub fn wants_json(headers: &HeaderMap) -> bool {
    let accepts_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    let is_xhr = headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
    accepts_json || is_xhr
}

/// 401 for API callers, `303 See Other` to the login page for browsers.
pub fn unauthenticated(headers: &HeaderMap) -> Response {
    if wants_json(headers) {
        json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required")
    } else {
        Redirect::to("/login").into_response()
    }
}

pub fn forbidden() -> Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "insufficient permissions")
}

pub fn missing_param(name: &'static str) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "missing_route_param",
        format!("route has no '{name}' parameter"),
    )
}
