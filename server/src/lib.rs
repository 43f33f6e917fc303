//! RBAC Server
//!
//! Module/action role grants, resolved at request time into the operation
//! identifiers a role may invoke.

pub mod api;
pub mod config;
pub mod db;
pub mod permissions;
pub mod store;

use anyhow::{Context as _, Result};
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::Config;
use crate::store::{Context, InMemoryStore, PgStore, Store};

/// Open the configured store, seed it and build the application state.
///
/// With a database URL the schema migrations run (they seed the built-in
/// modules). Without one an in-memory store is seeded directly. The
/// bootstrap admin role, if configured, is created or refreshed last.
pub async fn build_state(config: Config) -> Result<AppState> {
    let store = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url, config.database_max_connections).await?;
            db::run_migrations(&pool).await?;
            Store::Postgres(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store. Nothing will persist");
            Store::Memory(InMemoryStore::new())
        }
    };

    let ctx = Context::with_timeout(config.store_timeout);
    permissions::ensure_builtin_modules(&store, &ctx)
        .await
        .context("Failed to seed built-in modules")?;

    if let Some(name) = &config.bootstrap_admin_role {
        let role = permissions::ensure_admin_role(&store, &ctx, name)
            .await
            .context("Failed to bootstrap admin role")?;
        info!(role_id = role.id, name = %role.name, "Bootstrap admin role ready");
    }

    Ok(AppState::new(store, config))
}
