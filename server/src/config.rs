//! Server Configuration
//!
//! Loads configuration from environment variables.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_address: String,

    /// `PostgreSQL` connection URL. When unset the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum pooled database connections (default: 20)
    pub database_max_connections: u32,

    /// Deadline applied to the store work of a single request (default: 5s)
    pub store_timeout: Duration,

    /// Header carrying the caller's role id, set by the authenticating proxy
    pub caller_role_header: String,

    /// Role created at startup with every built-in grant, if it does not exist
    pub bootstrap_admin_role: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unset keys take defaults;
    /// malformed numbers are errors.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let store_timeout_ms: u64 = get("STORE_TIMEOUT_MS")
            .map(|v| v.parse())
            .transpose()
            .context("STORE_TIMEOUT_MS must be an integer")?
            .unwrap_or(5000);
        let database_max_connections: u32 = get("DATABASE_MAX_CONNECTIONS")
            .map(|v| v.parse())
            .transpose()
            .context("DATABASE_MAX_CONNECTIONS must be an integer")?
            .unwrap_or(20);

        Ok(Self {
            bind_address: get("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into()),
            database_url: get("DATABASE_URL").filter(|v| !v.is_empty()),
            database_max_connections,
            store_timeout: Duration::from_millis(store_timeout_ms),
            caller_role_header: get("CALLER_ROLE_HEADER")
                .unwrap_or_else(|| "x-authenticated-role".into())
                .to_ascii_lowercase(),
            bootstrap_admin_role: get("BOOTSTRAP_ADMIN_ROLE").filter(|v| !v.trim().is_empty()),
        })
    }

    /// Create a default configuration for testing.
    ///
    /// Uses the in-memory store. Postgres-backed tests read `DATABASE_URL`
    /// themselves.
    #[must_use]
    pub fn default_for_test() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".into(),
            database_url: None,
            database_max_connections: 5,
            store_timeout: Duration::from_secs(5),
            caller_role_header: "x-authenticated-role".into(),
            bootstrap_admin_role: Some("Admin".into()),
        }
    }
}
