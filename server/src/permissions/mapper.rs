//! Role-Module Mapper.
//!
//! Turns a role request into grant records checked against the module
//! catalog, then persists the role and its grants as one unit. One bad
//! grant rejects the whole request.

use std::collections::HashMap;

use rbac_common::{join_actions, parse_actions, ActionSet, NewAllowedModule, NewRole, RoleUpdate};
use tracing::{info, warn};
use validator::Validate;

use super::validators::{validate_existence, validate_uniqueness};
use super::AccessError;
use crate::db::{Module, NewRoleModule, Role, RoleModule};
use crate::store::{Condition, Context, Resource, ResourceStore, StoreError};

/// Check requested grants against a catalog of module id to action list.
///
/// Fails on the first grant that references an unknown module, a module
/// without actions, or an action the module does not offer. Stored
/// actions are the lower-cased request tokens.
pub fn check_grants(
    catalog: &HashMap<i64, String>,
    requested: &[NewAllowedModule],
) -> Result<Vec<NewRoleModule>, AccessError> {
    requested
        .iter()
        .map(|grant| {
            let valid = catalog
                .get(&grant.module_id)
                .map(|actions| ActionSet::parse(actions))
                .filter(|set| set.iter().any(|a| !a.is_empty()))
                .ok_or_else(|| {
                    warn!(module_id = grant.module_id, "Grant references unknown module");
                    AccessError::NotFound("module_id not found".into())
                })?;

            let actions = parse_actions(&grant.allowed_actions);
            let invalid = actions
                .iter()
                .find(|a| a.is_empty())
                .map(String::as_str)
                .or_else(|| valid.first_missing(&actions));
            if let Some(action) = invalid {
                warn!(
                    module_id = grant.module_id,
                    action, "Grant requests action outside module catalog"
                );
                return Err(AccessError::InvalidGrant("invalid module action".into()));
            }

            Ok(NewRoleModule {
                module_id: grant.module_id,
                allowed_actions: join_actions(&actions),
            })
        })
        .collect()
}

/// Load the catalog once and check every requested grant against it.
async fn map_role_modules<S>(
    store: &S,
    ctx: &Context,
    requested: &[NewAllowedModule],
) -> Result<Vec<NewRoleModule>, AccessError>
where
    S: ResourceStore + ?Sized,
{
    let catalog: HashMap<i64, String> = store
        .fetch_all::<Module>(ctx, &["id"])
        .await?
        .into_iter()
        .map(|m| (m.id, m.actions))
        .collect();
    check_grants(&catalog, requested)
}

fn check_request(request: &impl Validate) -> Result<(), AccessError> {
    request
        .validate()
        .map_err(|e| AccessError::Validation(e.to_string()))
}

/// A grant target that vanished between the catalog check and the write
/// reads the same as one that never existed.
fn grant_write_error(err: StoreError) -> AccessError {
    match err {
        StoreError::NotFound { resource, .. } if resource == Module::KIND => {
            AccessError::NotFound("module_id not found".into())
        }
        other => other.into(),
    }
}

/// Create a role with its grants.
#[tracing::instrument(skip(store, ctx, request), fields(name = %request.name))]
pub async fn create_role<S>(store: &S, ctx: &Context, request: &NewRole) -> Result<Role, AccessError>
where
    S: ResourceStore + ?Sized,
{
    check_request(request)?;
    validate_uniqueness::<Role, _>(store, ctx, "name", request.name.as_str(), None).await?;
    let grants = map_role_modules(store, ctx, &request.allowed_modules).await?;

    let role = store
        .create_role_with_grants(ctx, &request.name, &grants)
        .await
        .map_err(grant_write_error)?;

    info!(role_id = role.id, grants = role.role_modules.len(), "Role created");
    Ok(role)
}

/// Rename a role and/or replace its whole grant set.
///
/// Absent fields are left unchanged: a rename alone keeps every grant.
#[tracing::instrument(skip(store, ctx, request))]
pub async fn update_role<S>(
    store: &S,
    ctx: &Context,
    id: i64,
    request: &RoleUpdate,
) -> Result<Role, AccessError>
where
    S: ResourceStore + ?Sized,
{
    check_request(request)?;
    validate_existence::<Role, _>(store, ctx, id)
        .await
        .map_err(|e| match e {
            AccessError::NotFound(_) => AccessError::NotFound("role not found".into()),
            other => other,
        })?;
    if let Some(name) = &request.name {
        validate_uniqueness::<Role, _>(store, ctx, "name", name.as_str(), Some(id)).await?;
    }
    let grants = match &request.allowed_modules {
        Some(requested) => Some(map_role_modules(store, ctx, requested).await?),
        None => None,
    };

    let role = store
        .update_role(ctx, id, request.name.as_deref(), grants.as_deref())
        .await
        .map_err(grant_write_error)?;

    info!(role_id = id, grants = role.role_modules.len(), "Role updated");
    Ok(role)
}

/// Load a role with its grants.
pub async fn get_role<S>(store: &S, ctx: &Context, id: i64) -> Result<Role, AccessError>
where
    S: ResourceStore + ?Sized,
{
    let mut role = store
        .fetch_by_id::<Role>(ctx, id)
        .await
        .map_err(|e| match AccessError::from(e) {
            AccessError::NotFound(_) => AccessError::NotFound("role not found".into()),
            other => other,
        })?;
    role.role_modules = store
        .fetch_where::<RoleModule>(ctx, &Condition::eq("role_id", id), &["id"])
        .await?;
    Ok(role)
}

/// All roles with their grants, oldest first.
pub async fn list_roles<S>(store: &S, ctx: &Context) -> Result<Vec<Role>, AccessError>
where
    S: ResourceStore + ?Sized,
{
    let mut roles = store
        .fetch_all::<Role>(ctx, &["created_at", "id"])
        .await?;

    let mut grants: HashMap<i64, Vec<RoleModule>> = HashMap::new();
    for grant in store.fetch_all::<RoleModule>(ctx, &["id"]).await? {
        grants.entry(grant.role_id).or_default().push(grant);
    }
    for role in &mut roles {
        role.role_modules = grants.remove(&role.id).unwrap_or_default();
    }
    Ok(roles)
}

/// Delete a role and its grants.
#[tracing::instrument(skip(store, ctx))]
pub async fn delete_role<S>(store: &S, ctx: &Context, id: i64) -> Result<(), AccessError>
where
    S: ResourceStore + ?Sized,
{
    store.delete_role(ctx, id).await.map_err(|e| match AccessError::from(e) {
        AccessError::NotFound(_) => AccessError::NotFound("role not found".into()),
        other => other,
    })?;
    info!(role_id = id, "Role deleted");
    Ok(())
}
