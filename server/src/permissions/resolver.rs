//! Permission resolution.
//!
//! Expands a role's grants into the operation identifiers it may invoke.
//! Every grant is re-intersected with its module's current action catalog,
//! so removing an action from a module revokes it from every role without
//! touching stored grants.

use std::collections::BTreeSet;

use rbac_common::{expand_action, parse_actions, ActionSet};
use tracing::debug;

use super::AccessError;
use crate::db::{Module, Role, RoleModule};
use crate::store::{Condition, Context, ResourceStore, StoreError};

/// Operation identifiers granted by `(grant, current module)` pairs.
///
/// Only actions present in both the grant and the module's catalog
/// survive. Pure: no store access.
pub fn collect_operations<'a, I>(grants: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = (&'a RoleModule, &'a Module)>,
{
    let mut operations = BTreeSet::new();
    for (grant, module) in grants {
        let valid = ActionSet::parse(&module.actions);
        let requested = parse_actions(&grant.allowed_actions);
        for action in valid.intersect(&requested) {
            operations.extend(expand_action(action, &module.name));
        }
    }
    operations
}

/// Resolve the operations `role_id` may invoke right now.
///
/// Grants whose module no longer exists are skipped.
pub async fn resolve_allowed_operations<S>(
    store: &S,
    ctx: &Context,
    role_id: i64,
) -> Result<BTreeSet<String>, AccessError>
where
    S: ResourceStore + ?Sized,
{
    match store.fetch_by_id::<Role>(ctx, role_id).await {
        Ok(_) => {}
        Err(StoreError::NotFound { .. }) => {
            return Err(AccessError::NotFound("role not found".into()));
        }
        Err(e) => return Err(e.into()),
    }

    let grants = store
        .fetch_where::<RoleModule>(ctx, &Condition::eq("role_id", role_id), &["id"])
        .await?;
    if grants.is_empty() {
        return Ok(BTreeSet::new());
    }

    let module_ids: BTreeSet<i64> = grants.iter().map(|g| g.module_id).collect();
    let modules = store
        .fetch_where::<Module>(ctx, &Condition::is_in("id", module_ids), &["id"])
        .await?;

    let pairs = grants.iter().filter_map(|grant| {
        let module = modules.iter().find(|m| m.id == grant.module_id);
        if module.is_none() {
            debug!(role_id, module_id = grant.module_id, "Skipping grant on missing module");
        }
        module.map(|m| (grant, m))
    });
    let operations = collect_operations(pairs);

    debug!(role_id, count = operations.len(), "Resolved operations");
    Ok(operations)
}

/// Fail with `Forbidden` unless `role_id` may invoke `operation`.
pub async fn authorize<S>(
    store: &S,
    ctx: &Context,
    role_id: i64,
    operation: &str,
) -> Result<(), AccessError>
where
    S: ResourceStore + ?Sized,
{
    let allowed = resolve_allowed_operations(store, ctx, role_id).await?;
    if allowed.contains(operation) {
        Ok(())
    } else {
        debug!(role_id, operation, "Operation not granted");
        Err(AccessError::Forbidden("Access Denied".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewRoleModule;
    use crate::store::InMemoryStore;
    use chrono::Utc;

    fn module(id: i64, name: &str, actions: &str) -> Module {
        Module {
            id,
            name: name.into(),
            actions: actions.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn role_module(module_id: i64, allowed_actions: &str) -> RoleModule {
        RoleModule {
            id: 1,
            role_id: 1,
            module_id,
            allowed_actions: allowed_actions.into(),
        }
    }

    fn set(ops: &[&str]) -> BTreeSet<String> {
        ops.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_read_and_update_on_product() {
        let product = module(1, "Product", "read;update;create;delete");
        let grant = role_module(1, "read;update");

        assert_eq!(
            collect_operations([(&grant, &product)]),
            set(&[
                "getProduct",
                "getProducts",
                "paginateProduct",
                "updateProduct",
                "toggleActiveProduct",
            ])
        );
    }

    #[test]
    fn test_lower_camel_module_and_custom_verb() {
        let unit = module(1, "productUnit", "read;Archive");
        let grant = role_module(1, "ARCHIVE");

        assert_eq!(
            collect_operations([(&grant, &unit)]),
            set(&["archiveProductUnit"])
        );
    }

    #[test]
    fn test_retired_action_is_dropped() {
        let product = module(1, "Product", "read");
        let grant = role_module(1, "read;update");

        assert_eq!(
            collect_operations([(&grant, &product)]),
            set(&["getProduct", "getProducts", "paginateProduct"])
        );
    }

    #[test]
    fn test_empty_grant_yields_nothing() {
        let product = module(1, "Product", "read;");
        let grant = role_module(1, "");

        assert!(collect_operations([(&grant, &product)]).is_empty());
    }

    #[test]
    fn test_operations_union_across_modules() {
        let product = module(1, "Product", "read;delete");
        let unit = module(2, "Unit", "delete");
        let a = role_module(1, "delete;delete");
        let b = role_module(2, "delete");

        assert_eq!(
            collect_operations([(&a, &product), (&b, &unit)]),
            set(&["deleteProduct", "deleteUnit"])
        );
    }

    async fn role_with_grant(
        store: &InMemoryStore,
        ctx: &Context,
        module_id: i64,
        actions: &str,
    ) -> Role {
        store
            .create_role_with_grants(
                ctx,
                "Cashier",
                &[NewRoleModule {
                    module_id,
                    allowed_actions: actions.into(),
                }],
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_catalog_edit_revokes_without_touching_grants() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        let product = store
            .create_module(&ctx, "Product", "read;update;create;delete")
            .await
            .unwrap();
        let role = role_with_grant(&store, &ctx, product.id, "read;update").await;

        let before = resolve_allowed_operations(&store, &ctx, role.id).await.unwrap();
        assert!(before.contains("toggleActiveProduct"));

        store
            .update_module(&ctx, product.id, None, Some("read"))
            .await
            .unwrap();

        let after = resolve_allowed_operations(&store, &ctx, role.id).await.unwrap();
        assert_eq!(after, set(&["getProduct", "getProducts", "paginateProduct"]));

        let grants = store
            .fetch_where::<RoleModule>(&ctx, &Condition::eq("role_id", role.id), &["id"])
            .await
            .unwrap();
        assert_eq!(grants[0].allowed_actions, "read;update");
    }

    #[tokio::test]
    async fn test_unknown_role() {
        let store = InMemoryStore::new();
        let ctx = Context::background();

        let err = resolve_allowed_operations(&store, &ctx, 7).await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound(ref m) if m == "role not found"));
    }

    #[tokio::test]
    async fn test_deleted_module_grants_nothing() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        let product = store.create_module(&ctx, "Product", "read").await.unwrap();
        let role = role_with_grant(&store, &ctx, product.id, "read").await;

        store.delete_module(&ctx, product.id).await.unwrap();

        assert!(resolve_allowed_operations(&store, &ctx, role.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_authorize() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        let product = store
            .create_module(&ctx, "product", "read;delete")
            .await
            .unwrap();
        let role = role_with_grant(&store, &ctx, product.id, "read").await;

        authorize(&store, &ctx, role.id, "getProducts").await.unwrap();

        let err = authorize(&store, &ctx, role.id, "deleteProduct")
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(ref m) if m == "Access Denied"));
    }

    #[tokio::test]
    async fn test_cancelled_context_surfaces() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        ctx.cancel();

        let err = resolve_allowed_operations(&store, &ctx, 1).await.unwrap_err();
        assert!(matches!(err, AccessError::Store(StoreError::Canceled)));
    }
}
