//! `PostgreSQL` backend.
//!
//! Reads are built with [`QueryBuilder`] so every value is a bound
//! parameter. Multi-row writes run in one transaction; if the [`Context`]
//! gives up first the transaction is dropped and rolled back.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use super::{Condition, Context, Resource, ResourceStore, StoreError, StoreResult};
use crate::db::{Module, NewRoleModule, Role, RoleModule};

const ROLE_COLUMNS: &str = "id, name, created_at, updated_at";
const ROLE_MODULE_COLUMNS: &str = "id, role_id, module_id, allowed_actions";
const MODULE_COLUMNS: &str = "id, name, actions, created_at, updated_at";

/// Store backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn select<T: Resource>() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!(
        "SELECT {} FROM {}",
        T::COLUMNS.join(", "),
        T::TABLE
    ))
}

fn push_order_by<T: Resource>(
    qb: &mut QueryBuilder<'_, Postgres>,
    order_by: &[&str],
) -> StoreResult<()> {
    for (i, column) in order_by.iter().enumerate() {
        qb.push(if i == 0 { " ORDER BY " } else { ", " });
        qb.push(T::column(column)?).push(" ASC");
    }
    Ok(())
}

async fn insert_grants(
    tx: &mut Transaction<'_, Postgres>,
    role_id: i64,
    grants: &[NewRoleModule],
) -> StoreResult<Vec<RoleModule>> {
    let mut inserted = Vec::with_capacity(grants.len());
    for grant in grants {
        let row = sqlx::query_as::<_, RoleModule>(&format!(
            "INSERT INTO role_modules (role_id, module_id, allowed_actions) \
             VALUES ($1, $2, $3) RETURNING {ROLE_MODULE_COLUMNS}"
        ))
        .bind(role_id)
        .bind(grant.module_id)
        .bind(&grant.allowed_actions)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            // Module deleted after the grants were checked.
            let missing_module = e
                .as_database_error()
                .is_some_and(|db| db.is_foreign_key_violation());
            if missing_module {
                StoreError::NotFound {
                    resource: Module::KIND,
                    id: grant.module_id,
                }
            } else {
                StoreError::from(e)
            }
        })?;
        inserted.push(row);
    }
    Ok(inserted)
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn fetch_by_id<T: Resource>(&self, ctx: &Context, id: i64) -> StoreResult<T> {
        ctx.run(async {
            debug!(table = T::TABLE, id, "fetch_by_id");
            let mut qb = select::<T>();
            qb.push(" WHERE id = ").push_bind(id);
            qb.build_query_as::<T>()
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound {
                    resource: T::KIND,
                    id,
                })
        })
        .await
    }

    async fn fetch_where<T: Resource>(
        &self,
        ctx: &Context,
        condition: &Condition,
        order_by: &[&str],
    ) -> StoreResult<Vec<T>> {
        condition.check_columns::<T>()?;
        ctx.run(async {
            debug!(table = T::TABLE, ?condition, "fetch_where");
            let mut qb = select::<T>();
            qb.push(" WHERE ");
            condition.push_sql::<T>(&mut qb)?;
            push_order_by::<T>(&mut qb, order_by)?;
            Ok(qb.build_query_as::<T>().fetch_all(&self.pool).await?)
        })
        .await
    }

    async fn count_where<T: Resource>(
        &self,
        ctx: &Context,
        condition: &Condition,
    ) -> StoreResult<i64> {
        condition.check_columns::<T>()?;
        ctx.run(async {
            debug!(table = T::TABLE, ?condition, "count_where");
            let mut qb = QueryBuilder::<Postgres>::new(format!(
                "SELECT COUNT(*) FROM {} WHERE ",
                T::TABLE
            ));
            condition.push_sql::<T>(&mut qb)?;
            Ok(qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?)
        })
        .await
    }

    async fn create_role_with_grants(
        &self,
        ctx: &Context,
        name: &str,
        grants: &[NewRoleModule],
    ) -> StoreResult<Role> {
        ctx.run(async {
            let mut tx = self.pool.begin().await?;

            let mut role = sqlx::query_as::<_, Role>(&format!(
                "INSERT INTO roles (name) VALUES ($1) RETURNING {ROLE_COLUMNS}"
            ))
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

            role.role_modules = insert_grants(&mut tx, role.id, grants).await?;
            tx.commit().await?;

            debug!(role_id = role.id, grants = grants.len(), "role inserted");
            Ok(role)
        })
        .await
    }

    async fn update_role(
        &self,
        ctx: &Context,
        id: i64,
        name: Option<&str>,
        grants: Option<&[NewRoleModule]>,
    ) -> StoreResult<Role> {
        ctx.run(async {
            let mut tx = self.pool.begin().await?;

            let mut role = sqlx::query_as::<_, Role>(&format!(
                "UPDATE roles SET name = COALESCE($2, name), updated_at = NOW() \
                 WHERE id = $1 RETURNING {ROLE_COLUMNS}"
            ))
            .bind(id)
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound {
                resource: Role::KIND,
                id,
            })?;

            role.role_modules = match grants {
                Some(grants) => {
                    sqlx::query("DELETE FROM role_modules WHERE role_id = $1")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    insert_grants(&mut tx, id, grants).await?
                }
                None => {
                    sqlx::query_as::<_, RoleModule>(&format!(
                        "SELECT {ROLE_MODULE_COLUMNS} FROM role_modules \
                         WHERE role_id = $1 ORDER BY id ASC"
                    ))
                    .bind(id)
                    .fetch_all(&mut *tx)
                    .await?
                }
            };
            tx.commit().await?;

            debug!(role_id = id, grants = role.role_modules.len(), "role updated");
            Ok(role)
        })
        .await
    }

    async fn delete_role(&self, ctx: &Context, id: i64) -> StoreResult<()> {
        ctx.run(async {
            let result = sqlx::query("DELETE FROM roles WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    resource: Role::KIND,
                    id,
                });
            }
            Ok(())
        })
        .await
    }

    async fn create_module(
        &self,
        ctx: &Context,
        name: &str,
        actions: &str,
    ) -> StoreResult<Module> {
        ctx.run(async {
            Ok(sqlx::query_as::<_, Module>(&format!(
                "INSERT INTO modules (name, actions) VALUES ($1, $2) RETURNING {MODULE_COLUMNS}"
            ))
            .bind(name)
            .bind(actions)
            .fetch_one(&self.pool)
            .await?)
        })
        .await
    }

    async fn update_module(
        &self,
        ctx: &Context,
        id: i64,
        name: Option<&str>,
        actions: Option<&str>,
    ) -> StoreResult<Module> {
        ctx.run(async {
            sqlx::query_as::<_, Module>(&format!(
                "UPDATE modules \
                 SET name = COALESCE($2, name), \
                     actions = COALESCE($3, actions), \
                     updated_at = NOW() \
                 WHERE id = $1 RETURNING {MODULE_COLUMNS}"
            ))
            .bind(id)
            .bind(name)
            .bind(actions)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound {
                resource: Module::KIND,
                id,
            })
        })
        .await
    }

    async fn delete_module(&self, ctx: &Context, id: i64) -> StoreResult<()> {
        ctx.run(async {
            let result = sqlx::query("DELETE FROM modules WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    resource: Module::KIND,
                    id,
                });
            }
            Ok(())
        })
        .await
    }

    async fn health_check(&self, ctx: &Context) -> StoreResult<()> {
        ctx.run(async {
            sqlx::query("SELECT 1").execute(&self.pool).await?;
            Ok(())
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
