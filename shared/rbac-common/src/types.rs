//! Request types for role and module administration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to create a role, or to replace an existing role's name and grants.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    #[validate(length(min = 1, max = 100, message = "Role name must be 1-100 characters"))]
    pub name: String,
    #[serde(default, alias = "allowed_modules")]
    pub allowed_modules: Vec<NewAllowedModule>,
}

/// One requested grant: a `;`-delimited subset of a module's actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAllowedModule {
    pub module_id: i64,
    pub allowed_actions: String,
}

/// Partial role edit. Absent fields are left unchanged; a present
/// `allowedModules` replaces the whole grant set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoleUpdate {
    #[validate(length(min = 1, max = 100, message = "Role name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(default, alias = "allowed_modules")]
    pub allowed_modules: Option<Vec<NewAllowedModule>>,
}

/// Request to register a module in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewModule {
    #[validate(length(min = 1, max = 100, message = "Module name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, message = "Module actions must not be empty"))]
    pub actions: String,
}

/// Partial module edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdate {
    #[validate(length(min = 1, max = 100, message = "Module name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Module actions must not be empty"))]
    pub actions: Option<String>,
}
