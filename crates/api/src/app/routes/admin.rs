//! Cross-facility administration (super only).

use axum::{Json, extract::Extension, response::IntoResponse};
use serde_json::json;

use haven_auth::AuthContext;

pub async fn facilities(Extension(ctx): Extension<AuthContext>) -> impl IntoResponse {
    Json(json!({
        "view": "facilities",
        "user_id": ctx.user_id,
        "role": ctx.role.as_str(),
    }))
}
