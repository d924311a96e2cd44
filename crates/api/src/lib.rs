//! HTTP layer: configuration, session store, route context, auth middleware
//! and the router.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
pub mod public;
pub mod session_store;
