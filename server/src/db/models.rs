//! Database Models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::store::Resource;

/// Catalog entry: a functional module and the actions it supports.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Module {
    pub id: i64,
    /// Display name, also the module segment of operation identifiers.
    pub name: String,
    /// `;`-delimited canonical actions. The only source of truth for
    /// what may be granted on this module.
    pub actions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Named bundle of module grants.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    #[sqlx(skip)]
    #[serde(default)]
    pub role_modules: Vec<RoleModule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Grant of a subset of one module's actions to one role.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct RoleModule {
    pub id: i64,
    pub role_id: i64,
    pub module_id: i64,
    pub allowed_actions: String,
}

/// Grant validated against the catalog but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoleModule {
    pub module_id: i64,
    pub allowed_actions: String,
}

impl Resource for Module {
    const TABLE: &'static str = "modules";
    const KIND: &'static str = "module";
    const COLUMNS: &'static [&'static str] = &["id", "name", "actions", "created_at", "updated_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for Role {
    const TABLE: &'static str = "roles";
    const KIND: &'static str = "role";
    const COLUMNS: &'static [&'static str] = &["id", "name", "created_at", "updated_at"];

    fn id(&self) -> i64 {
        self.id
    }
}

impl Resource for RoleModule {
    const TABLE: &'static str = "role_modules";
    const KIND: &'static str = "role_module";
    const COLUMNS: &'static [&'static str] = &["id", "role_id", "module_id", "allowed_actions"];

    fn id(&self) -> i64 {
        self.id
    }
}
