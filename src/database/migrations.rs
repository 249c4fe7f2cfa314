//! # Database Migrations
//!
//! Migrations live in `migrations/` using the `YYYYMMDDHHMMSS_description.sql`
//! naming convention and are embedded at compile time. `sqlx` takes a
//! PostgreSQL advisory lock while migrating, so several workers starting at
//! once can all call [`run_migrations`] safely.

use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::error::Result;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Apply any pending migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR.run(pool).await?;
    info!(
        migrations = MIGRATOR.iter().count(),
        "Batch schema migrations applied"
    );
    Ok(())
}
