//! API Router and Application State
//!
//! Central routing configuration and shared state.

pub mod middleware;
pub mod modules;
pub mod roles;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::store::{Context, ResourceStore, Store};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Resource store backend
    pub store: Store,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Store context for one request, bounded by the configured timeout.
    #[must_use]
    pub fn context(&self) -> Context {
        Context::with_timeout(self.config.store_timeout)
    }

    #[must_use]
    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Every route here maps to an operation identifier the caller's role
    // must hold; see `middleware::route_operation`.
    let gated_routes = Router::new()
        .merge(roles::router())
        .merge(modules::router())
        .route_layer(from_fn_with_state(state.clone(), middleware::require_operation));

    // Caller identity is required for everything under /api
    let api_routes = Router::new()
        .route("/api/me/operations", get(roles::my_operations))
        .merge(gated_routes)
        .layer(from_fn_with_state(state.clone(), middleware::require_caller));

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Store backend in use
    store: &'static str,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let backend = state.store.backend_name();
    match state.store.health_check(&state.context()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                store: backend,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, backend, "Store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    store: backend,
                }),
            )
        }
    }
}
