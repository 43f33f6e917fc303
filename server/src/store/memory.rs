//! In-memory backend.
//!
//! Rows are kept as JSON objects keyed by id, one map per table, behind a
//! single [`RwLock`]. Multi-row writes validate everything first and then
//! mutate under one write guard, so readers see either none or all of a
//! role and its grants. Not durable; intended for development and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::debug;

use super::condition::compare_json;
use super::{Condition, Context, Resource, ResourceStore, StoreError, StoreResult};
use crate::db::{Module, NewRoleModule, Role, RoleModule};

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<&'static str, BTreeMap<i64, JsonValue>>,
    last_ids: HashMap<&'static str, i64>,
}

impl Tables {
    fn table(&self, name: &'static str) -> impl Iterator<Item = &JsonValue> {
        self.rows.get(name).into_iter().flat_map(BTreeMap::values)
    }

    fn get<T: Resource>(&self, id: i64) -> StoreResult<T> {
        let row = self
            .rows
            .get(T::TABLE)
            .and_then(|t| t.get(&id))
            .ok_or(StoreError::NotFound {
                resource: T::KIND,
                id,
            })?;
        Ok(serde_json::from_value(row.clone())?)
    }

    fn contains<T: Resource>(&self, id: i64) -> bool {
        self.rows.get(T::TABLE).is_some_and(|t| t.contains_key(&id))
    }

    fn next_id(&mut self, table: &'static str) -> i64 {
        let id = self.last_ids.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn put<T: Resource>(&mut self, entity: &T) -> StoreResult<()> {
        let row = serde_json::to_value(entity)?;
        self.rows.entry(T::TABLE).or_default().insert(entity.id(), row);
        Ok(())
    }

    fn name_taken<T: Resource>(&self, name: &str, except: Option<i64>) -> bool {
        let name = JsonValue::from(name);
        self.table(T::TABLE).any(|row| {
            row.get("name") == Some(&name)
                && except.map_or(true, |id| row.get("id").and_then(JsonValue::as_i64) != Some(id))
        })
    }

    fn remove_grants_where(&mut self, column: &str, id: i64) {
        if let Some(grants) = self.rows.get_mut(RoleModule::TABLE) {
            grants.retain(|_, row| row.get(column).and_then(JsonValue::as_i64) != Some(id));
        }
    }

    fn grants_of(&self, role_id: i64) -> StoreResult<Vec<RoleModule>> {
        self.table(RoleModule::TABLE)
            .filter(|row| row.get("role_id").and_then(JsonValue::as_i64) == Some(role_id))
            .map(|row| serde_json::from_value(row.clone()).map_err(StoreError::from))
            .collect()
    }

    /// Check grant targets before anything is written.
    fn check_grants(&self, grants: &[NewRoleModule]) -> StoreResult<()> {
        match grants.iter().find(|g| !self.contains::<Module>(g.module_id)) {
            Some(missing) => Err(StoreError::NotFound {
                resource: Module::KIND,
                id: missing.module_id,
            }),
            None => Ok(()),
        }
    }

    fn insert_grants(
        &mut self,
        role_id: i64,
        grants: &[NewRoleModule],
    ) -> StoreResult<Vec<RoleModule>> {
        let mut inserted = Vec::with_capacity(grants.len());
        for grant in grants {
            let row = RoleModule {
                id: self.next_id(RoleModule::TABLE),
                role_id,
                module_id: grant.module_id,
                allowed_actions: grant.allowed_actions.clone(),
            };
            self.put(&row)?;
            inserted.push(row);
        }
        Ok(inserted)
    }
}

/// Process-local store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn fetch_by_id<T: Resource>(&self, ctx: &Context, id: i64) -> StoreResult<T> {
        ctx.run(async {
            debug!(table = T::TABLE, id, "fetch_by_id");
            self.tables.read().await.get::<T>(id)
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
        let order_by = order_by
            .iter()
            .map(|c| T::column(c))
            .collect::<StoreResult<Vec<_>>>()?;

        ctx.run(async {
            debug!(table = T::TABLE, ?condition, "fetch_where");
            let tables = self.tables.read().await;
            let mut rows: Vec<&JsonValue> = tables
                .table(T::TABLE)
                .filter(|row| condition.matches(row))
                .collect();

            rows.sort_by(|a, b| {
                order_by
                    .iter()
                    .map(|c| compare_json(&a[*c], &b[*c]))
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            rows.into_iter()
                .map(|row| serde_json::from_value::<T>(row.clone()).map_err(StoreError::from))
                .collect::<StoreResult<Vec<T>>>()
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
            let tables = self.tables.read().await;
            Ok(tables
                .table(T::TABLE)
                .filter(|row| condition.matches(row))
                .count() as i64)
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
            let mut tables = self.tables.write().await;
            if tables.name_taken::<Role>(name, None) {
                return Err(StoreError::Conflict("idx_roles_name".into()));
            }
            tables.check_grants(grants)?;

            let now = Utc::now();
            let mut role = Role {
                id: tables.next_id(Role::TABLE),
                name: name.to_owned(),
                role_modules: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            tables.put(&role)?;
            role.role_modules = tables.insert_grants(role.id, grants)?;

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
            let mut tables = self.tables.write().await;
            let mut role = tables.get::<Role>(id)?;
            if let Some(name) = name {
                if tables.name_taken::<Role>(name, Some(id)) {
                    return Err(StoreError::Conflict("idx_roles_name".into()));
                }
            }
            if let Some(grants) = grants {
                tables.check_grants(grants)?;
            }

            if let Some(name) = name {
                name.clone_into(&mut role.name);
            }
            role.updated_at = Utc::now();
            role.role_modules = Vec::new();
            tables.put(&role)?;
            if let Some(grants) = grants {
                tables.remove_grants_where("role_id", id);
                tables.insert_grants(id, grants)?;
            }
            role.role_modules = tables.grants_of(id)?;

            debug!(role_id = id, grants = role.role_modules.len(), "role updated");
            Ok(role)
        })
        .await
    }

    async fn delete_role(&self, ctx: &Context, id: i64) -> StoreResult<()> {
        ctx.run(async {
            let mut tables = self.tables.write().await;
            let removed = tables
                .rows
                .get_mut(Role::TABLE)
                .and_then(|t| t.remove(&id));
            if removed.is_none() {
                return Err(StoreError::NotFound {
                    resource: Role::KIND,
                    id,
                });
            }
            tables.remove_grants_where("role_id", id);
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
            let mut tables = self.tables.write().await;
            if tables.name_taken::<Module>(name, None) {
                return Err(StoreError::Conflict("idx_modules_name".into()));
            }

            let now = Utc::now();
            let module = Module {
                id: tables.next_id(Module::TABLE),
                name: name.to_owned(),
                actions: actions.to_owned(),
                created_at: now,
                updated_at: now,
            };
            tables.put(&module)?;
            Ok(module)
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
            let mut tables = self.tables.write().await;
            let mut module = tables.get::<Module>(id)?;
            if let Some(name) = name {
                if tables.name_taken::<Module>(name, Some(id)) {
                    return Err(StoreError::Conflict("idx_modules_name".into()));
                }
                name.clone_into(&mut module.name);
            }
            if let Some(actions) = actions {
                actions.clone_into(&mut module.actions);
            }
            module.updated_at = Utc::now();
            tables.put(&module)?;
            Ok(module)
        })
        .await
    }

    async fn delete_module(&self, ctx: &Context, id: i64) -> StoreResult<()> {
        ctx.run(async {
            let mut tables = self.tables.write().await;
            let removed = tables
                .rows
                .get_mut(Module::TABLE)
                .and_then(|t| t.remove(&id));
            if removed.is_none() {
                return Err(StoreError::NotFound {
                    resource: Module::KIND,
                    id,
                });
            }
            tables.remove_grants_where("module_id", id);
            Ok(())
        })
        .await
    }

    async fn health_check(&self, ctx: &Context) -> StoreResult<()> {
        ctx.run(async { Ok(()) }).await
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
