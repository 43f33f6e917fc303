//! Module/action access control.
//!
//! - Validators: existence, bulk existence and uniqueness checks over any
//!   [`Resource`](crate::store::Resource)
//! - Mapper: checks requested grants against the module catalog and writes
//!   a role with its grants as one unit
//! - Resolver: expands a role's grants, re-checked against the current
//!   catalog, into operation identifiers
//! - Catalog: module administration and startup seeding

pub mod catalog;
pub mod error;
pub mod mapper;
pub mod resolver;
pub mod validators;

pub use catalog::{
    create_module, delete_module, ensure_admin_role, ensure_builtin_modules, get_module,
    list_modules, update_module, BUILTIN_MODULES,
};
pub use error::AccessError;
pub use mapper::{check_grants, create_role, delete_role, get_role, list_roles, update_role};
pub use resolver::{authorize, collect_operations, resolve_allowed_operations};
pub use validators::{validate_bulk_existence, validate_existence, validate_uniqueness};
