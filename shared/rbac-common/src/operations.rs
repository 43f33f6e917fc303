//! Operation expansion.
//!
//! A granted action on a module expands into one or more operation
//! identifiers, the names the request dispatcher checks against
//! (`getProduct`, `updateProduct`, ...). Most actions map to
//! `{action}{Module}`; the exceptions live in [`EXPANSIONS`] so that adding
//! another special case only touches that table.

/// Builds one operation identifier from a normalized module name.
pub type OperationTemplate = fn(&str) -> String;

fn get_one(module: &str) -> String {
    format!("get{module}")
}

fn get_many(module: &str) -> String {
    format!("get{module}s")
}

fn paginate(module: &str) -> String {
    format!("paginate{module}")
}

fn update(module: &str) -> String {
    format!("update{module}")
}

fn toggle_active(module: &str) -> String {
    format!("toggleActive{module}")
}

/// Actions whose operations differ from the `{action}{Module}` default.
pub const EXPANSIONS: &[(&str, &[OperationTemplate])] = &[
    ("read", &[get_one, get_many, paginate]),
    ("update", &[update, toggle_active]),
];

/// Upper-case the first character, leaving the rest untouched.
///
/// Stored module names may be lower-camel (`product`); operation
/// identifiers always use the upper-camel form (`Product`).
pub fn uppercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-case the first character, leaving the rest untouched.
pub fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Expand one action on one module into its operation identifiers.
///
/// ```
/// use rbac_common::expand_action;
///
/// assert_eq!(
///     expand_action("read", "product"),
///     vec!["getProduct", "getProducts", "paginateProduct"]
/// );
/// assert_eq!(expand_action("delete", "product"), vec!["deleteProduct"]);
/// ```
pub fn expand_action(action: &str, module_name: &str) -> Vec<String> {
    let module = uppercase_first(module_name);

    EXPANSIONS
        .iter()
        .find(|(name, _)| *name == action)
        .map_or_else(
            || vec![format!("{}{module}", lowercase_first(action))],
            |(_, templates)| templates.iter().map(|t| t(&module)).collect(),
        )
}
