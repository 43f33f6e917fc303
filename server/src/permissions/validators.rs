//! Constraint validators.
//!
//! Existence and uniqueness checks built on
//! [`ResourceStore::count_where`], usable for any [`Resource`].

use std::collections::BTreeSet;

use crate::store::{Condition, Context, Resource, ResourceStore, Value};

use super::AccessError;

/// Fail with `NotFound` unless a `T` with `id` exists.
pub async fn validate_existence<T, S>(store: &S, ctx: &Context, id: i64) -> Result<(), AccessError>
where
    T: Resource,
    S: ResourceStore + ?Sized,
{
    let count = store
        .count_where::<T>(ctx, &Condition::eq("id", id))
        .await?;
    if count == 0 {
        return Err(AccessError::NotFound(format!("{} record not found", T::KIND)));
    }
    Ok(())
}

/// Fail with `NotFound` unless every id in `ids` exists.
///
/// Duplicates in `ids` are ignored. All-or-nothing: one missing id fails the
/// whole check, and the error lists the ids that were missing. An empty
/// list passes.
pub async fn validate_bulk_existence<T, S>(
    store: &S,
    ctx: &Context,
    ids: &[i64],
) -> Result<(), AccessError>
where
    T: Resource,
    S: ResourceStore + ?Sized,
{
    let unique: BTreeSet<i64> = ids.iter().copied().collect();
    let condition = Condition::is_in("id", unique.iter().copied());

    let count = store.count_where::<T>(ctx, &condition).await?;
    if count == unique.len() as i64 {
        return Ok(());
    }

    let found: BTreeSet<i64> = store
        .fetch_where::<T>(ctx, &condition, &["id"])
        .await?
        .iter()
        .map(Resource::id)
        .collect();
    let missing: Vec<String> = unique
        .difference(&found)
        .map(ToString::to_string)
        .collect();

    Err(AccessError::NotFound(format!(
        "{} record not found: {}",
        T::KIND,
        missing.join(", ")
    )))
}

/// Fail with `Duplicate` if another `T` already has `value` in `column`.
///
/// `except_id` excludes one row from the check, for updates that keep their
/// current value. Values are compared as stored, so case sensitivity
/// follows the backend's collation.
pub async fn validate_uniqueness<T, S>(
    store: &S,
    ctx: &Context,
    column: &str,
    value: impl Into<Value>,
    except_id: Option<i64>,
) -> Result<(), AccessError>
where
    T: Resource,
    S: ResourceStore + ?Sized,
{
    let mut condition = Condition::eq(column, value);
    if let Some(id) = except_id {
        condition = condition.and(Condition::eq("id", id).negate());
    }

    let count = store.count_where::<T>(ctx, &condition).await?;
    if count > 0 {
        return Err(AccessError::Duplicate(format!("duplicate {column}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Module, Role};
    use crate::store::{InMemoryStore, StoreError};

    async fn store_with_modules(names: &[&str]) -> InMemoryStore {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        for name in names {
            store.create_module(&ctx, name, "read").await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_existence() {
        let store = store_with_modules(&["product"]).await;
        let ctx = Context::background();

        assert!(validate_existence::<Module, _>(&store, &ctx, 1).await.is_ok());

        let err = validate_existence::<Module, _>(&store, &ctx, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(ref m) if m == "module record not found"));
    }

    #[tokio::test]
    async fn test_bulk_existence_dedupes_and_is_all_or_nothing() {
        let store = store_with_modules(&["product"]).await;
        let ctx = Context::background();

        assert!(validate_bulk_existence::<Module, _>(&store, &ctx, &[1, 1, 1])
            .await
            .is_ok());

        let err = validate_bulk_existence::<Module, _>(&store, &ctx, &[1, 1, 2])
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound(ref m) if m.ends_with(": 2")));
    }

    #[tokio::test]
    async fn test_bulk_existence_lists_every_missing_id() {
        let store = store_with_modules(&["product", "unit"]).await;
        let ctx = Context::background();

        let err = validate_bulk_existence::<Module, _>(&store, &ctx, &[5, 2, 4, 1])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "module record not found: 4, 5");
    }

    #[tokio::test]
    async fn test_bulk_existence_empty_list_passes() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        assert!(validate_bulk_existence::<Module, _>(&store, &ctx, &[])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_uniqueness_with_and_without_exclusion() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        let role = store.create_role_with_grants(&ctx, "Admin", &[]).await.unwrap();

        let err = validate_uniqueness::<Role, _>(&store, &ctx, "name", "Admin", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Duplicate(ref m) if m == "duplicate name"));

        // Keeping its own name is not a conflict.
        assert!(
            validate_uniqueness::<Role, _>(&store, &ctx, "name", "Admin", Some(role.id))
                .await
                .is_ok()
        );

        assert!(validate_uniqueness::<Role, _>(&store, &ctx, "name", "Cashier", None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_uniqueness_exclusion_only_skips_that_row() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        store.create_role_with_grants(&ctx, "Admin", &[]).await.unwrap();
        let other = store.create_role_with_grants(&ctx, "Clerk", &[]).await.unwrap();

        let err = validate_uniqueness::<Role, _>(&store, &ctx, "name", "Admin", Some(other.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_uniqueness_is_case_sensitive() {
        let store = InMemoryStore::new();
        let ctx = Context::background();
        store.create_role_with_grants(&ctx, "Admin", &[]).await.unwrap();

        assert!(validate_uniqueness::<Role, _>(&store, &ctx, "name", "admin", None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_uniqueness_unknown_column_is_store_error() {
        let store = InMemoryStore::new();
        let ctx = Context::background();

        let err = validate_uniqueness::<Role, _>(&store, &ctx, "nickname", "x", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccessError::Store(StoreError::UnknownColumn { .. })
        ));
    }
}
