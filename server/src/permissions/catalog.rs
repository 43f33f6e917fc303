//! Module catalog administration.
//!
//! Editing a module's actions takes effect on the next resolution for every
//! role that holds a grant on it; stored grants are never rewritten.

use rbac_common::{join_actions, parse_actions, ModuleUpdate, NewModule};
use tracing::info;
use validator::Validate;

use super::validators::{validate_existence, validate_uniqueness};
use super::AccessError;
use crate::db::{Module, NewRoleModule, Role};
use crate::store::{Condition, Context, ResourceStore, StoreError};

/// Modules every deployment carries, guarding role and module administration.
pub const BUILTIN_MODULES: &[(&str, &str)] = &[
    ("role", "read;create;update;delete"),
    ("module", "read;create;update;delete"),
];

/// Normalize a submitted action list, rejecting empty tokens.
fn normalize_actions(actions: &str) -> Result<String, AccessError> {
    let tokens = parse_actions(actions);
    if tokens.iter().any(String::is_empty) {
        return Err(AccessError::Validation(
            "module actions must not contain empty entries".into(),
        ));
    }
    Ok(join_actions(&tokens))
}

fn module_not_found(err: StoreError) -> AccessError {
    match AccessError::from(err) {
        AccessError::NotFound(_) => AccessError::NotFound("module not found".into()),
        other => other,
    }
}

#[tracing::instrument(skip(store, ctx, request), fields(name = %request.name))]
pub async fn create_module<S>(
    store: &S,
    ctx: &Context,
    request: &NewModule,
) -> Result<Module, AccessError>
where
    S: ResourceStore + ?Sized,
{
    request
        .validate()
        .map_err(|e| AccessError::Validation(e.to_string()))?;
    let actions = normalize_actions(&request.actions)?;
    validate_uniqueness::<Module, _>(store, ctx, "name", request.name.as_str(), None).await?;

    let module = store.create_module(ctx, &request.name, &actions).await?;
    info!(module_id = module.id, actions = %module.actions, "Module created");
    Ok(module)
}

/// Apply a partial edit. Removing an action revokes it from every role.
#[tracing::instrument(skip(store, ctx, request))]
pub async fn update_module<S>(
    store: &S,
    ctx: &Context,
    id: i64,
    request: &ModuleUpdate,
) -> Result<Module, AccessError>
where
    S: ResourceStore + ?Sized,
{
    request
        .validate()
        .map_err(|e| AccessError::Validation(e.to_string()))?;
    validate_existence::<Module, _>(store, ctx, id)
        .await
        .map_err(|e| match e {
            AccessError::NotFound(_) => AccessError::NotFound("module not found".into()),
            other => other,
        })?;
    if let Some(name) = &request.name {
        validate_uniqueness::<Module, _>(store, ctx, "name", name.as_str(), Some(id)).await?;
    }
    let actions = request.actions.as_deref().map(normalize_actions).transpose()?;

    let module = store
        .update_module(ctx, id, request.name.as_deref(), actions.as_deref())
        .await
        .map_err(module_not_found)?;
    info!(module_id = id, actions = %module.actions, "Module updated");
    Ok(module)
}

pub async fn get_module<S>(store: &S, ctx: &Context, id: i64) -> Result<Module, AccessError>
where
    S: ResourceStore + ?Sized,
{
    store
        .fetch_by_id::<Module>(ctx, id)
        .await
        .map_err(module_not_found)
}

pub async fn list_modules<S>(store: &S, ctx: &Context) -> Result<Vec<Module>, AccessError>
where
    S: ResourceStore + ?Sized,
{
    Ok(store.fetch_all::<Module>(ctx, &["id"]).await?)
}

/// Delete a module together with every grant on it.
#[tracing::instrument(skip(store, ctx))]
pub async fn delete_module<S>(store: &S, ctx: &Context, id: i64) -> Result<(), AccessError>
where
    S: ResourceStore + ?Sized,
{
    store
        .delete_module(ctx, id)
        .await
        .map_err(module_not_found)?;
    info!(module_id = id, "Module deleted");
    Ok(())
}

/// Insert any missing [`BUILTIN_MODULES`]. Existing entries are left as is.
pub async fn ensure_builtin_modules<S>(store: &S, ctx: &Context) -> Result<(), AccessError>
where
    S: ResourceStore + ?Sized,
{
    for (name, actions) in BUILTIN_MODULES {
        let existing = store
            .count_where::<Module>(ctx, &Condition::eq("name", *name))
            .await?;
        if existing == 0 {
            store.create_module(ctx, name, actions).await?;
            info!(module = *name, "Seeded built-in module");
        }
    }
    Ok(())
}

/// Create or refresh a role holding every action of every catalog module.
///
/// Used at startup so a fresh deployment has a role able to administer
/// the rest.
pub async fn ensure_admin_role<S>(store: &S, ctx: &Context, name: &str) -> Result<Role, AccessError>
where
    S: ResourceStore + ?Sized,
{
    let grants: Vec<NewRoleModule> = store
        .fetch_all::<Module>(ctx, &["id"])
        .await?
        .into_iter()
        .filter(|m| parse_actions(&m.actions).iter().any(|a| !a.is_empty()))
        .map(|m| NewRoleModule {
            module_id: m.id,
            allowed_actions: m.actions,
        })
        .collect();

    let existing = store
        .fetch_where::<Role>(ctx, &Condition::eq("name", name), &["id"])
        .await?;
    let role = match existing.first() {
        Some(role) => {
            store
                .update_role(ctx, role.id, None, Some(grants.as_slice()))
                .await?
        }
        None => store.create_role_with_grants(ctx, name, &grants).await?,
    };

    info!(role_id = role.id, modules = grants.len(), "Admin role ready");
    Ok(role)
}
