//! Subcommand implementations.

pub mod migrate;
pub mod post;
pub mod user;

use thiserror::Error;
use yearbook_core::{GradeError, PostIdError, UsernameError};
use yearbook_server::config::{self, ConfigError};
use yearbook_server::db::{self, PgStore, RepositoryError};

/// Errors shared by every subcommand.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required configuration is missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Session table migration failed.
    #[error("Session store migration error: {0}")]
    SessionStore(String),

    /// Store operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Invalid grade argument.
    #[error(transparent)]
    InvalidGrade(#[from] GradeError),

    /// Invalid email or username argument.
    #[error(transparent)]
    InvalidUsername(#[from] UsernameError),

    /// Invalid post id argument.
    #[error(transparent)]
    InvalidPostId(#[from] PostIdError),
}

/// Connect to the yearbook database.
async fn connect() -> Result<PgStore, CommandError> {
    dotenvy::dotenv().ok();
    let database_url = config::get_database_url("YEARBOOK_DATABASE_URL")?;

    tracing::info!("Connecting to yearbook database...");
    let pool = db::create_pool(&database_url).await?;
    Ok(PgStore::new(pool))
}
