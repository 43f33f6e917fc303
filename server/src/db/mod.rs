//! Database Layer
//!
//! Entity models, `PostgreSQL` pool creation and migrations.

mod models;

use std::time::Duration;

use anyhow::Result;
pub use models::*;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(max_connections)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}
