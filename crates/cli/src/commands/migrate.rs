//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! yb-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `YEARBOOK_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Schema migrations live in `crates/server/migrations/`. The session table
//! used by the login flow is created by `tower-sessions-sqlx-store`.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, connect};

/// Run the yearbook schema migrations and create the session table.
///
/// # Errors
///
/// Returns `CommandError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let store = connect().await?;

    tracing::info!("Running yearbook migrations...");
    sqlx::migrate!("../server/migrations").run(store.pool()).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(store.pool().clone())
        .migrate()
        .await
        .map_err(|e| CommandError::SessionStore(e.to_string()))?;

    tracing::info!("Migrations complete!");
    Ok(())
}
