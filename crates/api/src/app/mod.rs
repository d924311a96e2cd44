//! HTTP application wiring (axum router + shared services).
//!
//! - `services.rs`: storage backends and the request-path service bundle
//! - `routes/`: handlers and per-route gates
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    middleware::{from_fn, from_fn_with_state},
};

use crate::{context, middleware};

pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, Backends, ServicesError};

/// Build the full HTTP router (used by `main.rs` and the black-box tests).
///
/// Auth resolution wraps everything, including unmatched paths; the route
/// context is attached to matched routes before any gate runs.
pub fn build_app(services: AppServices) -> Router {
    let services = Arc::new(services);

    routes::router(services.clone())
        .route_layer(from_fn(context::route_context))
        .layer(Extension(services.clone()))
        .layer(from_fn_with_state(services, middleware::auth_middleware))
}
