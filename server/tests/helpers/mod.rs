//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum router
//! over an in-memory store, plus small utilities for seeding roles and modules.
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use rbac_server::api::{create_router, AppState};
use rbac_server::build_state;
use rbac_server::config::Config;
use rbac_server::store::Context;
use tower::ServiceExt;

/// Full application router over a freshly seeded in-memory store.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    /// Id of the bootstrap admin role, which holds every built-in grant.
    pub admin_role_id: i64,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::default_for_test()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let admin_name = config.bootstrap_admin_role.clone();
        let state = build_state(config).await.expect("Failed to build state");

        let admin_role_id = match admin_name {
            Some(name) => rbac_server::permissions::list_roles(&state.store, &Context::background())
                .await
                .expect("Failed to list roles")
                .into_iter()
                .find(|r| r.name == name)
                .map(|r| r.id)
                .expect("Bootstrap admin role missing"),
            None => 0,
        };

        Self {
            router: create_router(state.clone()),
            state,
            admin_role_id,
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Build a request carrying `role_id` as the caller identity.
    pub fn request_as(&self, role_id: i64, method: Method, uri: &str) -> http::request::Builder {
        Self::request(method, uri).header(
            self.state.config.caller_role_header.as_str(),
            role_id.to_string(),
        )
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Send a JSON body as `role_id` and return the response.
    pub async fn send_json(
        &self,
        role_id: i64,
        method: Method,
        uri: &str,
        body: serde_json::Value,
    ) -> Response<Body> {
        let req = self
            .request_as(role_id, method, uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.oneshot(req).await
    }

    /// Send a bodiless request as `role_id` and return the response.
    pub async fn send(&self, role_id: i64, method: Method, uri: &str) -> Response<Body> {
        let req = self
            .request_as(role_id, method, uri)
            .body(Body::empty())
            .unwrap();
        self.oneshot(req).await
    }

    /// Create a module as the admin and return its id.
    pub async fn create_module(&self, name: &str, actions: &str) -> i64 {
        let resp = self
            .send_json(
                self.admin_role_id,
                Method::POST,
                "/api/modules",
                serde_json::json!({ "name": name, "actions": actions }),
            )
            .await;
        assert_eq!(resp.status(), 201, "module creation should succeed");
        body_to_json(resp).await["id"].as_i64().unwrap()
    }

    /// Create a role as the admin and return its id.
    pub async fn create_role(&self, name: &str, grants: serde_json::Value) -> i64 {
        let resp = self
            .send_json(
                self.admin_role_id,
                Method::POST,
                "/api/roles",
                serde_json::json!({ "name": name, "allowedModules": grants }),
            )
            .await;
        assert_eq!(resp.status(), 201, "role creation should succeed");
        body_to_json(resp).await["id"].as_i64().unwrap()
    }
}

/// Read a response body as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Response is not valid JSON")
}
