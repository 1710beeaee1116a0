//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a user ahead of their first login
//! yb-cli user add --email jane.doe@school.org --grade senior
//!
//! # Remove a user (their posts stay)
//! yb-cli user delete --username jane.doe
//! ```
//!
//! # Environment Variables
//!
//! - `YEARBOOK_DATABASE_URL` - `PostgreSQL` connection string
//! - `YEARBOOK_EMAIL_SUFFIX` - Organization email suffix used to derive usernames

use yearbook_core::{Grade, NewUser, Username};
use yearbook_server::config;
use yearbook_server::db::Store;

use super::{CommandError, connect};

/// Create a user from an organization email.
///
/// # Returns
///
/// The username the email resolved to.
///
/// # Errors
///
/// Returns `CommandError` for a bad email or grade, or if the user exists.
pub async fn add(email: &str, grade: &str, registered: bool) -> Result<Username, CommandError> {
    dotenvy::dotenv().ok();
    let policy = config::email_policy_from_env()?;
    let grade: Grade = grade.parse()?;
    let new_user = NewUser::new(email, grade, registered, &policy)?;

    let store = connect().await?;
    let user = store.add_user(&new_user).await?;

    tracing::info!(username = %user.username, id = %user.id, %grade, "User created");
    Ok(user.username)
}

/// Delete a user.
///
/// # Errors
///
/// Returns `CommandError` for a malformed username or an unknown user.
pub async fn delete(username: &str) -> Result<(), CommandError> {
    let username = Username::parse(username)?;

    let store = connect().await?;
    store.delete_user(&username).await?;

    tracing::info!(%username, "User deleted");
    Ok(())
}
