//! PostgreSQL Store Tests
//!
//! Exercise `PgStore` against a real database. Each test gets a fresh
//! database with migrations applied.
//!
//! Run with: `DATABASE_URL=postgres://... cargo test --test pg_store_test -- --ignored`

use rbac_common::{NewAllowedModule, NewRole};
use rbac_server::db::{Module, NewRoleModule, Role, RoleModule};
use rbac_server::permissions::{self, AccessError};
use rbac_server::store::{Condition, Context, PgStore, ResourceStore, StoreError};
use sqlx::PgPool;

fn grant(module_id: i64, allowed_actions: &str) -> NewAllowedModule {
    NewAllowedModule {
        module_id,
        allowed_actions: allowed_actions.into(),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL"]
async fn test_builtin_modules_are_seeded(pool: PgPool) {
    let store = PgStore::new(pool);
    let ctx = Context::background();

    let modules = store.fetch_all::<Module>(&ctx, &["id"]).await.unwrap();
    let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["role", "module"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL"]
async fn test_count_where_binds_values(pool: PgPool) {
    let store = PgStore::new(pool);
    let ctx = Context::background();

    let count = store
        .count_where::<Module>(&ctx, &Condition::eq("name", "role' OR '1'='1"))
        .await
        .unwrap();
    assert_eq!(count, 0);

    let count = store
        .count_where::<Module>(&ctx, &Condition::is_in("name", ["role", "module", "x"]))
        .await
        .unwrap();
    assert_eq!(count, 2);

    let err = store
        .count_where::<Module>(&ctx, &Condition::eq("name; DROP TABLE modules", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownColumn { .. }));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL"]
async fn test_role_with_grants_is_atomic(pool: PgPool) {
    let store = PgStore::new(pool);
    let ctx = Context::background();

    // Second grant references a missing module: the FK fails inside the
    // transaction and nothing is kept.
    let err = store
        .create_role_with_grants(
            &ctx,
            "Broken",
            &[
                NewRoleModule {
                    module_id: 1,
                    allowed_actions: "read".into(),
                },
                NewRoleModule {
                    module_id: 999,
                    allowed_actions: "read".into(),
                },
            ],
        )
        .await
        .unwrap_err();
    // Reported like the in-memory store: the grant names an unknown module.
    assert!(matches!(
        err,
        StoreError::NotFound { resource: "module", id: 999 }
    ));

    assert_eq!(
        store
            .count_where::<Role>(&ctx, &Condition::always())
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        store
            .count_where::<RoleModule>(&ctx, &Condition::always())
            .await
            .unwrap(),
        0
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL"]
async fn test_unique_index_maps_to_duplicate(pool: PgPool) {
    let store = PgStore::new(pool);
    let ctx = Context::background();

    store
        .create_role_with_grants(&ctx, "Admin", &[])
        .await
        .unwrap();
    let err = store
        .create_role_with_grants(&ctx, "Admin", &[])
        .await
        .unwrap_err();
    assert!(matches!(AccessError::from(err), AccessError::Duplicate(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL"]
async fn test_resolution_follows_catalog_edits(pool: PgPool) {
    let store = PgStore::new(pool);
    let ctx = Context::background();

    let product = store
        .create_module(&ctx, "Product", "read;update;create;delete")
        .await
        .unwrap();
    let role = permissions::create_role(
        &store,
        &ctx,
        &NewRole {
            name: "Cashier".into(),
            allowed_modules: vec![grant(product.id, "read;update")],
        },
    )
    .await
    .unwrap();

    let ops = permissions::resolve_allowed_operations(&store, &ctx, role.id)
        .await
        .unwrap();
    assert_eq!(ops.len(), 5);

    store
        .update_module(&ctx, product.id, None, Some("read"))
        .await
        .unwrap();
    let ops = permissions::resolve_allowed_operations(&store, &ctx, role.id)
        .await
        .unwrap();
    let ops: Vec<&str> = ops.iter().map(String::as_str).collect();
    assert_eq!(ops, vec!["getProduct", "getProducts", "paginateProduct"]);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL"]
async fn test_rename_keeps_grants_and_bad_grant_reads_as_missing_module(pool: PgPool) {
    let store = PgStore::new(pool);
    let ctx = Context::background();

    let role = store
        .create_role_with_grants(
            &ctx,
            "Clerk",
            &[NewRoleModule {
                module_id: 1,
                allowed_actions: "read".into(),
            }],
        )
        .await
        .unwrap();

    let renamed = store
        .update_role(&ctx, role.id, Some("Senior Clerk"), None)
        .await
        .unwrap();
    assert_eq!(renamed.name, "Senior Clerk");
    assert_eq!(renamed.role_modules.len(), 1);
    assert_eq!(renamed.role_modules[0].allowed_actions, "read");

    let err = store
        .update_role(
            &ctx,
            role.id,
            Some("Lost"),
            Some(&[NewRoleModule {
                module_id: 999,
                allowed_actions: "read".into(),
            }][..]),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::NotFound { resource: "module", id: 999 }
    ));

    let kept = store.fetch_by_id::<Role>(&ctx, role.id).await.unwrap();
    assert_eq!(kept.name, "Senior Clerk");
    assert_eq!(
        store
            .count_where::<RoleModule>(&ctx, &Condition::eq("role_id", role.id))
            .await
            .unwrap(),
        1
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL"]
async fn test_delete_cascades_grants(pool: PgPool) {
    let store = PgStore::new(pool);
    let ctx = Context::background();

    let role = store
        .create_role_with_grants(
            &ctx,
            "Clerk",
            &[NewRoleModule {
                module_id: 1,
                allowed_actions: "read".into(),
            }],
        )
        .await
        .unwrap();

    store.delete_role(&ctx, role.id).await.unwrap();
    assert_eq!(
        store
            .count_where::<RoleModule>(&ctx, &Condition::eq("role_id", role.id))
            .await
            .unwrap(),
        0
    );

    let err = store.delete_role(&ctx, role.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "Requires PostgreSQL"]
async fn test_expired_deadline_aborts(pool: PgPool) {
    let store = PgStore::new(pool);
    let ctx = Context::with_timeout(std::time::Duration::ZERO);

    let err = store
        .fetch_all::<Module>(&ctx, &["id"])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::DeadlineExceeded | StoreError::Canceled
    ));
}
