//! Routes that skip session resolution.

use std::collections::HashSet;

use axum::http::Method;

/// Exact `(method, path)` allowlist plus path prefixes (static assets).
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct PublicRoutes {
    exact: HashSet<(Method, String)>,
    prefixes: Vec<String>,
}

impl PublicRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The portal's public surface: login/logout, registration, password setup, landing page.
    pub fn portal() -> Self {
        Self::new()
            .allow(Method::GET, "/login")
            .allow(Method::POST, "/login")
            .allow(Method::POST, "/logout")
            .allow(Method::GET, "/register")
            .allow(Method::POST, "/register")
            .allow(Method::GET, "/set-password")
            .allow(Method::POST, "/set-password")
            .allow(Method::GET, "/")
            .allow(Method::GET, "/health")
            .allow_prefix("/static/")
    }

    pub fn allow(mut self, method: Method, path: impl Into<String>) -> Self {
        self.exact.insert((method, path.into()));
        self
    }

    pub fn allow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn is_public(&self, method: &Method, path: &str) -> bool {
        self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self.exact.contains(&(method.clone(), path.to_string()))
    }
}
