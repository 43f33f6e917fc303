//! RBAC Common Library
//!
//! Action vocabulary, operation expansion and request types shared by the
//! server and anything that needs to reason about module grants.

pub mod actions;
pub mod operations;
pub mod types;

pub use actions::{join_actions, parse_actions, ActionSet, ACTION_DELIMITER};
pub use operations::{expand_action, lowercase_first, uppercase_first, OperationTemplate};
pub use types::*;
