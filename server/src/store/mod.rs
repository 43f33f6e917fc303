//! Generic resource store.
//!
//! Fetch-by-id, fetch-all and count-where primitives over any persisted
//! entity that implements [`Resource`], plus the few multi-row writes the
//! access-control model needs to be atomic. Two backends implement
//! [`ResourceStore`]: `PostgreSQL` ([`PgStore`]) and an in-memory map
//! ([`InMemoryStore`]) for development and tests. [`Store`] picks one at
//! startup.
//!
//! Every operation takes a [`Context`] and gives up with
//! [`StoreError::Canceled`] or [`StoreError::DeadlineExceeded`] instead of
//! blocking. Nothing in this layer retries.

mod condition;
mod context;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use thiserror::Error;

pub use condition::{Condition, Value};
pub use context::Context;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

use crate::db::{Module, NewRoleModule, Role};

/// An entity with an integer primary key stored in a named table.
///
/// `COLUMNS` lists every column a condition or ordering may reference;
/// anything else is rejected before a query is built.
pub trait Resource:
    Serialize + DeserializeOwned + for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;
    /// Singular name used in error messages.
    const KIND: &'static str;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;

    /// Resolve a caller-supplied column name to its declared form.
    fn column(name: &str) -> StoreResult<&'static str> {
        Self::COLUMNS
            .iter()
            .copied()
            .find(|c| *c == name)
            .ok_or_else(|| StoreError::UnknownColumn {
                resource: Self::KIND,
                column: name.to_owned(),
            })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{resource} record not found")]
    NotFound { resource: &'static str, id: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unknown column {column:?} on {resource}")]
    UnknownColumn {
        resource: &'static str,
        column: String,
    },

    #[error("operation canceled")]
    Canceled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db) = err.as_database_error() {
            if db.is_unique_violation() {
                return Self::Conflict(
                    db.constraint()
                        .map_or_else(|| db.message().to_owned(), str::to_owned),
                );
            }
        }
        Self::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Load one entity by primary key.
    async fn fetch_by_id<T: Resource>(&self, ctx: &Context, id: i64) -> StoreResult<T>;

    /// Load every entity matching `condition`, ascending by `order_by`.
    async fn fetch_where<T: Resource>(
        &self,
        ctx: &Context,
        condition: &Condition,
        order_by: &[&str],
    ) -> StoreResult<Vec<T>>;

    /// Count entities matching `condition`.
    async fn count_where<T: Resource>(&self, ctx: &Context, condition: &Condition)
        -> StoreResult<i64>;

    /// Load the whole collection, ascending by `order_by`.
    async fn fetch_all<T: Resource>(&self, ctx: &Context, order_by: &[&str]) -> StoreResult<Vec<T>> {
        self.fetch_where::<T>(ctx, &Condition::always(), order_by)
            .await
    }

    /// Insert a role and all of its grants as one unit.
    async fn create_role_with_grants(
        &self,
        ctx: &Context,
        name: &str,
        grants: &[NewRoleModule],
    ) -> StoreResult<Role>;

    /// Rename a role and/or replace its whole grant set as one unit.
    ///
    /// `None` leaves that part unchanged. The returned role carries its
    /// grants as they stand after the update.
    async fn update_role(
        &self,
        ctx: &Context,
        id: i64,
        name: Option<&str>,
        grants: Option<&[NewRoleModule]>,
    ) -> StoreResult<Role>;

    /// Delete a role together with its grants.
    async fn delete_role(&self, ctx: &Context, id: i64) -> StoreResult<()>;

    async fn create_module(&self, ctx: &Context, name: &str, actions: &str)
        -> StoreResult<Module>;

    /// Update the provided module fields, leaving the others unchanged.
    async fn update_module(
        &self,
        ctx: &Context,
        id: i64,
        name: Option<&str>,
        actions: Option<&str>,
    ) -> StoreResult<Module>;

    /// Delete a module. Grants referencing it go with it.
    async fn delete_module(&self, ctx: &Context, id: i64) -> StoreResult<()>;

    async fn health_check(&self, ctx: &Context) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// Store backend selected at startup.
#[derive(Clone)]
pub enum Store {
    Memory(InMemoryStore),
    Postgres(PgStore),
}

#[async_trait]
impl ResourceStore for Store {
    async fn fetch_by_id<T: Resource>(&self, ctx: &Context, id: i64) -> StoreResult<T> {
        match self {
            Self::Memory(s) => s.fetch_by_id::<T>(ctx, id).await,
            Self::Postgres(s) => s.fetch_by_id::<T>(ctx, id).await,
        }
    }

    async fn fetch_where<T: Resource>(
        &self,
        ctx: &Context,
        condition: &Condition,
        order_by: &[&str],
    ) -> StoreResult<Vec<T>> {
        match self {
            Self::Memory(s) => s.fetch_where::<T>(ctx, condition, order_by).await,
            Self::Postgres(s) => s.fetch_where::<T>(ctx, condition, order_by).await,
        }
    }

    async fn count_where<T: Resource>(
        &self,
        ctx: &Context,
        condition: &Condition,
    ) -> StoreResult<i64> {
        match self {
            Self::Memory(s) => s.count_where::<T>(ctx, condition).await,
            Self::Postgres(s) => s.count_where::<T>(ctx, condition).await,
        }
    }

    async fn create_role_with_grants(
        &self,
        ctx: &Context,
        name: &str,
        grants: &[NewRoleModule],
    ) -> StoreResult<Role> {
        match self {
            Self::Memory(s) => s.create_role_with_grants(ctx, name, grants).await,
            Self::Postgres(s) => s.create_role_with_grants(ctx, name, grants).await,
        }
    }

    async fn update_role(
        &self,
        ctx: &Context,
        id: i64,
        name: Option<&str>,
        grants: Option<&[NewRoleModule]>,
    ) -> StoreResult<Role> {
        match self {
            Self::Memory(s) => s.update_role(ctx, id, name, grants).await,
            Self::Postgres(s) => s.update_role(ctx, id, name, grants).await,
        }
    }

    async fn delete_role(&self, ctx: &Context, id: i64) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.delete_role(ctx, id).await,
            Self::Postgres(s) => s.delete_role(ctx, id).await,
        }
    }

    async fn create_module(
        &self,
        ctx: &Context,
        name: &str,
        actions: &str,
    ) -> StoreResult<Module> {
        match self {
            Self::Memory(s) => s.create_module(ctx, name, actions).await,
            Self::Postgres(s) => s.create_module(ctx, name, actions).await,
        }
    }

    async fn update_module(
        &self,
        ctx: &Context,
        id: i64,
        name: Option<&str>,
        actions: Option<&str>,
    ) -> StoreResult<Module> {
        match self {
            Self::Memory(s) => s.update_module(ctx, id, name, actions).await,
            Self::Postgres(s) => s.update_module(ctx, id, name, actions).await,
        }
    }

    async fn delete_module(&self, ctx: &Context, id: i64) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.delete_module(ctx, id).await,
            Self::Postgres(s) => s.delete_module(ctx, id).await,
        }
    }

    async fn health_check(&self, ctx: &Context) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.health_check(ctx).await,
            Self::Postgres(s) => s.health_check(ctx).await,
        }
    }

    fn backend_name(&self) -> &'static str {
        match self {
            Self::Memory(s) => s.backend_name(),
            Self::Postgres(s) => s.backend_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RoleModule;

    #[test]
    fn test_column_lookup() {
        assert_eq!(Role::column("name").unwrap(), "name");
        assert_eq!(RoleModule::column("role_id").unwrap(), "role_id");

        let err = Role::column("name; DROP TABLE roles").unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { resource: "role", .. }));
    }

    #[test]
    fn test_role_modules_is_not_a_column() {
        assert!(Role::column("role_modules").is_err());
    }

    #[test]
    fn test_not_found_message_names_resource() {
        let err = StoreError::NotFound {
            resource: "module",
            id: 9,
        };
        assert_eq!(err.to_string(), "module record not found");
    }
}
