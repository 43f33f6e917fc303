//! Module Catalog API

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rbac_common::{ModuleUpdate, NewModule};
use serde::Serialize;

use super::middleware::RequestContext;
use crate::api::AppState;
use crate::db::Module;
use crate::permissions::{self, AccessError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleResponse {
    pub id: i64,
    pub name: String,
    pub actions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Module> for ModuleResponse {
    fn from(module: Module) -> Self {
        Self {
            id: module.id,
            name: module.name,
            actions: module.actions,
            created_at: module.created_at,
            updated_at: module.updated_at,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/modules", get(list_modules).post(create_module))
        .route(
            "/api/modules/{id}",
            get(get_module).patch(update_module).delete(delete_module),
        )
}

#[tracing::instrument(skip(state, ctx))]
pub async fn list_modules(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
) -> Result<Json<Vec<ModuleResponse>>, AccessError> {
    let modules = permissions::list_modules(&state.store, &ctx).await?;
    Ok(Json(modules.into_iter().map(Into::into).collect()))
}

#[tracing::instrument(skip(state, ctx, body))]
pub async fn create_module(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(body): Json<NewModule>,
) -> Result<(StatusCode, Json<ModuleResponse>), AccessError> {
    let module = permissions::create_module(&state.store, &ctx, &body).await?;
    Ok((StatusCode::CREATED, Json(module.into())))
}

#[tracing::instrument(skip(state, ctx))]
pub async fn get_module(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<i64>,
) -> Result<Json<ModuleResponse>, AccessError> {
    let module = permissions::get_module(&state.store, &ctx, id).await?;
    Ok(Json(module.into()))
}

/// Partial edit. Dropping an action revokes it from every role on the next request.
#[tracing::instrument(skip(state, ctx, body))]
pub async fn update_module(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<i64>,
    Json(body): Json<ModuleUpdate>,
) -> Result<Json<ModuleResponse>, AccessError> {
    let module = permissions::update_module(&state.store, &ctx, id, &body).await?;
    Ok(Json(module.into()))
}

#[tracing::instrument(skip(state, ctx))]
pub async fn delete_module(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<i64>,
) -> Result<StatusCode, AccessError> {
    permissions::delete_module(&state.store, &ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
