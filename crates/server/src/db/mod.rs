//! Data-access layer for the yearbook.
//!
//! # Database: `yearbook`
//!
//! ## Tables
//!
//! - `yearbook.user` - Students, with denormalized inbound/outbound post id lists
//! - `yearbook.post` - Content-hashed posts
//! - `yearbook.token` - Latest identity-provider access token per subject
//! - `tower_sessions.session` - Tower-sessions storage (created by the CLI)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p yearbook-cli -- migrate
//! ```
//!
//! Handlers never touch a pool directly. They go through the [`Store`] trait,
//! which has a `PostgreSQL` implementation ([`PgStore`]) and an in-process
//! one ([`MemoryStore`]) with the same semantics.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use yearbook_core::{Grade, NewUser, Post, PostId, Username};

use crate::models::user::{StoredToken, User, UserPatch};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is invalid or corrupted.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Record not found.
    #[error("not found")]
    NotFound,

    /// Unique constraint violation.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Storage operations behind every handler.
///
/// Multi-step writes (`publish_post`, `delete_post`, `update_user`) are
/// atomic in every implementation. Lists returned by the `get_*posts`
/// family are ordered newest first, ties broken by insertion order
/// (newest first).
pub trait Store: Send + Sync + 'static {
    /// Check that the backing store is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert a post.
    ///
    /// Returns `Conflict` if a post with the same id already exists.
    fn add_post(&self, post: &Post) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert a post and record it on its sender's outbound list and every
    /// recipient's inbound list, all or nothing.
    fn publish_post(
        &self,
        post: &Post,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch one post by id. Returns `NotFound` if it does not exist.
    fn get_post(&self, id: &PostId) -> impl Future<Output = Result<Post, RepositoryError>> + Send;

    /// Fetch every post.
    fn get_all_posts(&self) -> impl Future<Output = Result<Vec<Post>, RepositoryError>> + Send;

    /// Fetch up to `n` posts after skipping `offset`.
    fn get_n_posts(
        &self,
        n: u32,
        offset: u32,
    ) -> impl Future<Output = Result<Vec<Post>, RepositoryError>> + Send;

    /// Count stored posts.
    fn count_posts(&self) -> impl Future<Output = Result<u64, RepositoryError>> + Send;

    /// Fetch the posts with the given ids, skipping ids that do not resolve.
    fn get_posts_by_ids(
        &self,
        ids: &[PostId],
    ) -> impl Future<Output = Result<Vec<Post>, RepositoryError>> + Send;

    /// Delete a post and scrub its id from every inbound and outbound list.
    ///
    /// Returns the deleted post, or `NotFound`.
    fn delete_post(&self, id: &PostId)
    -> impl Future<Output = Result<Post, RepositoryError>> + Send;

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert a user. Returns `Conflict` on a duplicate username or email.
    fn add_user(&self, user: &NewUser)
    -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Fetch one user. Returns `NotFound` if it does not exist.
    fn get_user(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Fetch every user, ordered by username.
    fn get_all_users(&self) -> impl Future<Output = Result<Vec<User>, RepositoryError>> + Send;

    /// Fetch every username, sorted.
    fn get_all_usernames(
        &self,
    ) -> impl Future<Output = Result<Vec<Username>, RepositoryError>> + Send;

    /// Fetch the usernames of every user in one grade, sorted.
    fn get_usernames_by_grade(
        &self,
        grade: Grade,
    ) -> impl Future<Output = Result<Vec<Username>, RepositoryError>> + Send;

    /// Apply a partial profile update in one atomic step.
    ///
    /// Returns the updated user, or `NotFound`.
    fn update_user(
        &self,
        patch: &UserPatch,
    ) -> impl Future<Output = Result<User, RepositoryError>> + Send;

    /// Delete a user. Posts mentioning them are left alone.
    fn delete_user(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Append `post_id` to the sender's outbound list and each recipient's
    /// inbound list.
    ///
    /// Ids already present are left alone. Usernames without a user row are
    /// skipped.
    fn add_to_and_from(
        &self,
        post_id: &PostId,
        sender: &Username,
        recipients: &[Username],
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Mark a user as registered and set their profile picture.
    ///
    /// `None` clears the picture.
    fn init_account(
        &self,
        username: &Username,
        profile_pic: Option<&str>,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Store the latest token for a subject, replacing any previous one.
    fn insert_token(
        &self,
        token: &StoredToken,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Fetch the stored token for a subject.
    fn get_token(
        &self,
        sub: &str,
    ) -> impl Future<Output = Result<Option<StoredToken>, RepositoryError>> + Send;

    // =========================================================================
    // Derived reads
    // =========================================================================

    /// Posts addressed to a user.
    fn get_user_inbound(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<Vec<Post>, RepositoryError>> + Send {
        async move {
            let user = self.get_user(username).await?;
            self.get_posts_by_ids(&user.inbound_posts).await
        }
    }

    /// Posts sent by a user.
    fn get_user_outbound(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<Vec<Post>, RepositoryError>> + Send {
        async move {
            let user = self.get_user(username).await?;
            self.get_posts_by_ids(&user.outbound_posts).await
        }
    }

    /// Posts addressed to and sent by a user, as `(inbound, outbound)`.
    fn get_user_inbound_outbound(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<(Vec<Post>, Vec<Post>), RepositoryError>> + Send {
        async move {
            let user = self.get_user(username).await?;
            let inbound = self.get_posts_by_ids(&user.inbound_posts).await?;
            let outbound = self.get_posts_by_ids(&user.outbound_posts).await?;
            Ok((inbound, outbound))
        }
    }
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_or_database(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(e)
}
