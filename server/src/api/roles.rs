//! Role Administration API

use std::collections::BTreeSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rbac_common::{NewRole, RoleUpdate};
use serde::Serialize;

use super::middleware::{Caller, RequestContext};
use crate::api::AppState;
use crate::db::{Role, RoleModule};
use crate::permissions::{self, AccessError};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResponse {
    pub id: i64,
    pub role_id: i64,
    pub module_id: i64,
    pub allowed_actions: String,
}

impl From<RoleModule> for GrantResponse {
    fn from(grant: RoleModule) -> Self {
        Self {
            id: grant.id,
            role_id: grant.role_id,
            module_id: grant.module_id,
            allowed_actions: grant.allowed_actions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: i64,
    pub name: String,
    pub role_modules: Vec<GrantResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            name: role.name,
            role_modules: role.role_modules.into_iter().map(Into::into).collect(),
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

/// Operations a role resolves to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationsResponse {
    pub role_id: i64,
    pub operations: BTreeSet<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/roles", get(list_roles).post(create_role))
        .route(
            "/api/roles/{id}",
            get(get_role).patch(update_role).delete(delete_role),
        )
        .route("/api/roles/{id}/operations", get(role_operations))
}

#[tracing::instrument(skip(state, ctx))]
pub async fn list_roles(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> Result<Json<Vec<RoleResponse>>, AccessError> {
    let roles = permissions::list_roles(&state.store, &ctx).await?;
    Ok(Json(roles.into_iter().map(Into::into).collect()))
}

#[tracing::instrument(skip(state, ctx, body))]
pub async fn create_role(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(body): Json<NewRole>,
) -> Result<(StatusCode, Json<RoleResponse>), AccessError> {
    let role = permissions::create_role(&state.store, &ctx, &body).await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

#[tracing::instrument(skip(state, ctx))]
pub async fn get_role(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<RoleResponse>, AccessError> {
    let role = permissions::get_role(&state.store, &ctx, id).await?;
    Ok(Json(role.into()))
}

/// Partial edit. Without `allowedModules` the role keeps its grants.
#[tracing::instrument(skip(state, ctx, body))]
pub async fn update_role(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<i64>,
    Json(body): Json<RoleUpdate>,
) -> Result<Json<RoleResponse>, AccessError> {
    let role = permissions::update_role(&state.store, &ctx, id, &body).await?;
    Ok(Json(role.into()))
}

#[tracing::instrument(skip(state, ctx))]
pub async fn delete_role(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<i64>,
) -> Result<StatusCode, AccessError> {
    permissions::delete_role(&state.store, &ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, ctx))]
pub async fn role_operations(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<OperationsResponse>, AccessError> {
    let operations = permissions::resolve_allowed_operations(&state.store, &ctx, id).await?;
    Ok(Json(OperationsResponse {
        role_id: id,
        operations,
    }))
}

/// Operations available to the calling role. Needs no grant of its own.
#[tracing::instrument(skip(state, ctx))]
pub async fn my_operations(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    caller: Caller,
) -> Result<Json<OperationsResponse>, AccessError> {
    let operations =
        permissions::resolve_allowed_operations(&state.store, &ctx, caller.role_id).await?;
    Ok(Json(OperationsResponse {
        role_id: caller.role_id,
        operations,
    }))
}
