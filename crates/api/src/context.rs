use axum::{
    extract::{MatchedPath, RawPathParams, Request},
    middleware::Next,
    response::Response,
};
use serde::Serialize;

pub const FACILITY_PARAM: &str = "facility_code";
pub const INITIALS_PARAM: &str = "user_initials";

/// Route-derived context for a request (navigation + facility scoping).
///
/// Built for every matched route, public ones included, before any gate runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteContext {
    pub facility_code: Option<String>,
    pub user_initials: Option<String>,
    /// `/facility/{code}` or `/facility/{code}/{initials}`; empty without a facility.
    pub base_path: String,
    /// Matched route pattern.
    pub current_path: String,
    /// Literal request path.
    pub full_path: String,
}

impl RouteContext {
    pub fn build<'a>(
        pattern: &str,
        full_path: &str,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut facility_code = None;
        let mut user_initials = None;
        for (name, value) in params {
            match name {
                FACILITY_PARAM if !value.is_empty() => facility_code = Some(value.to_string()),
                INITIALS_PARAM if !value.is_empty() => user_initials = Some(value.to_string()),
                _ => {}
            }
        }

        let base_path = match (&facility_code, &user_initials) {
            (Some(code), Some(initials)) => format!("/facility/{code}/{initials}"),
            (Some(code), None) => format!("/facility/{code}"),
            (None, _) => String::new(),
        };

        Self {
            facility_code,
            user_initials,
            base_path,
            current_path: pattern.to_string(),
            full_path: full_path.to_string(),
        }
    }

    pub fn facility_code(&self) -> Option<&str> {
        self.facility_code.as_deref()
    }

    pub fn user_initials(&self) -> Option<&str> {
        self.user_initials.as_deref()
    }
}

/// Route layer inserting [`RouteContext`] into request extensions.
pub async fn route_context(
    matched: Option<MatchedPath>,
    params: Option<RawPathParams>,
    mut req: Request,
    next: Next,
) -> Response {
    let full_path = req.uri().path().to_string();
    let pattern = matched.as_ref().map(|m| m.as_str()).unwrap_or(full_path.as_str());

    let ctx = match &params {
        Some(params) => RouteContext::build(pattern, &full_path, params.iter()),
        None => RouteContext::build(pattern, &full_path, std::iter::empty()),
    };

    req.extensions_mut().insert(ctx);
    next.run(req).await
}
