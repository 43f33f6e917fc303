//! Caller identity and operation gating.
//!
//! Authentication happens in front of this service: the fronting layer
//! forwards the caller's role id in a configured header. These middlewares
//! only decide what that role may do.
//!
//! The store [`Context`] is created once per request, when the caller is
//! extracted, so the gate and the handler share one deadline.

use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::AppState;
use crate::permissions::{authorize, AccessError};
use crate::store::Context;

/// Authenticated caller injected into request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub role_id: i64,
}

/// Store context of the current request.
///
/// Taken from request extensions; routes outside [`require_caller`] get a
/// fresh one.
#[derive(Debug, Clone)]
pub struct RequestContext(pub Context);

/// Operation identifier guarding each gated route, by method and path.
pub const ROUTE_OPERATIONS: &[(&str, &str, &str)] = &[
    ("GET", "/api/roles", "getRoles"),
    ("POST", "/api/roles", "createRole"),
    ("GET", "/api/roles/{id}", "getRole"),
    ("PATCH", "/api/roles/{id}", "updateRole"),
    ("DELETE", "/api/roles/{id}", "deleteRole"),
    ("GET", "/api/roles/{id}/operations", "getRole"),
    ("GET", "/api/modules", "getModules"),
    ("POST", "/api/modules", "createModule"),
    ("GET", "/api/modules/{id}", "getModule"),
    ("PATCH", "/api/modules/{id}", "updateModule"),
    ("DELETE", "/api/modules/{id}", "deleteModule"),
];

/// Look up the operation a route requires.
pub fn route_operation(method: &str, path: &str) -> Option<&'static str> {
    ROUTE_OPERATIONS
        .iter()
        .find(|(m, p, _)| *m == method && *p == path)
        .map(|(_, _, op)| *op)
}

/// Middleware to require a caller identity.
///
/// Reads the role id from the configured header and injects [`Caller`]
/// and the request's store [`Context`] into request extensions. Missing or
/// malformed ids are rejected with `401`.
pub async fn require_caller(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AccessError> {
    let role_id = request
        .headers()
        .get(state.config.caller_role_header.as_str())
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or(AccessError::Unauthenticated)?;

    request.extensions_mut().insert(Caller { role_id });
    request.extensions_mut().insert(state.context());
    Ok(next.run(request).await)
}

/// Middleware that requires the caller's role to hold the route's operation.
///
/// Routes missing from [`ROUTE_OPERATIONS`] are denied. A caller whose
/// role no longer exists is treated like one without the grant.
#[tracing::instrument(skip(state, request, next), fields(method = %request.method()))]
pub async fn require_operation(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AccessError> {
    let caller = request
        .extensions()
        .get::<Caller>()
        .copied()
        .ok_or(AccessError::Unauthenticated)?;

    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_default();
    let Some(operation) = route_operation(request.method().as_str(), path) else {
        tracing::warn!(path, "No operation registered for route");
        return Err(AccessError::Forbidden("Access Denied".into()));
    };

    let ctx = request
        .extensions()
        .get::<Context>()
        .cloned()
        .unwrap_or_else(|| state.context());

    authorize(&state.store, &ctx, caller.role_id, operation)
        .await
        .map_err(|e| match e {
            AccessError::NotFound(_) => AccessError::Forbidden("Access Denied".into()),
            other => other,
        })?;

    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AccessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .copied()
            .ok_or(AccessError::Unauthenticated)
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<Context>()
                .cloned()
                .unwrap_or_else(|| state.context()),
        ))
    }
}
