use std::sync::Arc;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

use haven_auth::Role;

use crate::app::services::AppServices;
use crate::middleware::{redirect_authenticated, require_profile_access, require_role, validate_facility};

pub mod admin;
pub mod auth;
pub mod facility;
pub mod system;

/// Route table with per-route gates. Later `route_layer`s run first.
pub fn router(services: Arc<AppServices>) -> Router {
    let login = Router::new()
        .route("/login", get(auth::login_page))
        .route_layer(from_fn_with_state(services, redirect_authenticated))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout));

    let calendar = Router::new()
        .route("/facility/:facility_code/calendar", get(facility::calendar))
        .route_layer(from_fn(validate_facility));

    let users = Router::new()
        .route("/facility/:facility_code/users", get(facility::users))
        .route_layer(from_fn_with_state(Role::Admin, require_role))
        .route_layer(from_fn(validate_facility));

    let profile = Router::new()
        .route("/facility/:facility_code/users/:user_initials", get(facility::profile))
        .route_layer(from_fn(require_profile_access))
        .route_layer(from_fn(validate_facility));

    let admin = Router::new()
        .route("/admin/facilities", get(admin::facilities))
        .route_layer(from_fn_with_state(Role::Super, require_role));

    Router::new()
        .route("/", get(system::index))
        .route("/health", get(system::health))
        .route("/whoami", get(system::whoami))
        .merge(login)
        .merge(calendar)
        .merge(users)
        .merge(profile)
        .merge(admin)
}
