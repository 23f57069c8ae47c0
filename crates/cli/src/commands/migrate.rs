//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! sf-cli migrate
//! ```
//!
//! Migrations live in `crates/server/migrations/` and are embedded at build
//! time. The server never runs them itself.

use shopfront_server::db;

use super::{CommandError, database_url};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
