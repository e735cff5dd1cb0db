//! Database migration commands.
//!
//! Migrations are embedded at compile time from
//! `crates/storefront/migrations/` and applied against the store database.

use super::CommandError;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../storefront/migrations");

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CommandError` when the database is unreachable or a migration
/// fails to apply.
pub async fn run() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Running store migrations...");
    MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}

/// Revert the most recent migration.
///
/// Only works for migrations with a paired `.down.sql`; ours are forward-only,
/// so this mainly exists to surface a clear error instead of a silent no-op.
///
/// # Errors
///
/// Returns `CommandError` when the database is unreachable or the revert
/// fails.
pub async fn revert() -> Result<(), CommandError> {
    let pool = super::connect().await?;

    tracing::info!("Reverting last migration...");
    MIGRATOR.undo(&pool, -1).await?;

    tracing::info!("Revert complete");
    Ok(())
}
