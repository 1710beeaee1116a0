//! `PostgreSQL` [`Store`] implementation.
//!
//! Queries are checked at runtime (`query_as` + `FromRow`). Every
//! multi-statement write runs in a single transaction.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use yearbook_core::{Grade, NewUser, Post, PostId, UserId, Username};

use super::{RepositoryError, Store, conflict_or_database};
use crate::models::user::{StoredToken, User, UserPatch};

const USER_COLUMNS: &str = "id, username, firstname, lastname, email, grade, register_date, \
     nickname, profile_pic, bio, will, registered, inbound_posts, outbound_posts";

const POST_COLUMNS: &str = "post_id, created_at, sender, recipients, message, images";

/// A `Store` backed by a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    username: String,
    firstname: String,
    lastname: String,
    email: String,
    grade: Grade,
    register_date: DateTime<Utc>,
    nickname: Option<String>,
    profile_pic: Option<String>,
    bio: Option<String>,
    will: Option<String>,
    registered: bool,
    inbound_posts: Vec<String>,
    outbound_posts: Vec<String>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            username: parse_username(&row.username)?,
            firstname: row.firstname,
            lastname: row.lastname,
            email: row.email,
            grade: row.grade,
            register_date: row.register_date,
            nickname: row.nickname,
            profile_pic: row.profile_pic,
            bio: row.bio,
            will: row.will,
            registered: row.registered,
            inbound_posts: parse_post_ids(&row.inbound_posts)?,
            outbound_posts: parse_post_ids(&row.outbound_posts)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    post_id: String,
    created_at: DateTime<Utc>,
    sender: String,
    recipients: Vec<String>,
    message: String,
    images: Vec<Vec<u8>>,
}

impl TryFrom<PostRow> for Post {
    type Error = RepositoryError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let recipients = row
            .recipients
            .iter()
            .map(|r| parse_username(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::restore(
            parse_post_id(&row.post_id)?,
            row.created_at,
            parse_username(&row.sender)?,
            recipients,
            row.message,
            row.images,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    sub: String,
    token: String,
    email: String,
}

impl From<TokenRow> for StoredToken {
    fn from(row: TokenRow) -> Self {
        Self {
            sub: row.sub,
            token: SecretString::from(row.token),
            email: row.email,
        }
    }
}

fn parse_username(s: &str) -> Result<Username, RepositoryError> {
    Username::parse(s)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid username in database: {e}")))
}

fn parse_post_id(s: &str) -> Result<PostId, RepositoryError> {
    PostId::parse(s)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid post id in database: {e}")))
}

fn parse_post_ids(ids: &[String]) -> Result<Vec<PostId>, RepositoryError> {
    ids.iter().map(|id| parse_post_id(id)).collect()
}

fn usernames(list: &[Username]) -> Vec<String> {
    list.iter().map(|u| u.as_str().to_owned()).collect()
}

// =============================================================================
// Shared statements
// =============================================================================

async fn insert_post(tx: &mut Transaction<'_, Postgres>, post: &Post) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO yearbook.post (post_id, created_at, sender, recipients, message, images)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(post.post_id().as_str())
    .bind(post.timestamp())
    .bind(post.sender().as_str())
    .bind(usernames(post.recipients()))
    .bind(post.message())
    .bind(post.images())
    .execute(&mut **tx)
    .await
    .map_err(|e| conflict_or_database(e, "post"))?;
    Ok(())
}

async fn append_lists(
    tx: &mut Transaction<'_, Postgres>,
    post_id: &PostId,
    sender: &Username,
    recipients: &[Username],
) -> Result<(), RepositoryError> {
    let outbound = sqlx::query(
        r"
        UPDATE yearbook.user
        SET outbound_posts = array_append(outbound_posts, $1)
        WHERE username = $2 AND NOT ($1 = ANY(outbound_posts))
        ",
    )
    .bind(post_id.as_str())
    .bind(sender.as_str())
    .execute(&mut **tx)
    .await?;

    if outbound.rows_affected() == 0 {
        debug!(%sender, %post_id, "outbound list unchanged (no user row or already present)");
    }

    let inbound = sqlx::query(
        r"
        UPDATE yearbook.user
        SET inbound_posts = array_append(inbound_posts, $1)
        WHERE username = ANY($2) AND NOT ($1 = ANY(inbound_posts))
        ",
    )
    .bind(post_id.as_str())
    .bind(usernames(recipients))
    .execute(&mut **tx)
    .await?;

    debug!(
        %post_id,
        recipients = recipients.len(),
        updated = inbound.rows_affected(),
        "Appended to inbound lists"
    );
    Ok(())
}

// =============================================================================
// Store
// =============================================================================

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self, post), fields(post_id = %post.post_id()))]
    async fn add_post(&self, post: &Post) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_post(&mut tx, post).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, post), fields(post_id = %post.post_id()))]
    async fn publish_post(&self, post: &Post) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_post(&mut tx, post).await?;
        append_lists(&mut tx, post.post_id(), post.sender(), post.recipients()).await?;
        tx.commit().await?;

        debug!("Published post");
        Ok(())
    }

    async fn get_post(&self, id: &PostId) -> Result<Post, RepositoryError> {
        let row: Option<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM yearbook.post WHERE post_id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    async fn get_all_posts(&self) -> Result<Vec<Post>, RepositoryError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM yearbook.post ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    async fn get_n_posts(&self, n: u32, offset: u32) -> Result<Vec<Post>, RepositoryError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM yearbook.post \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(n))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    async fn count_posts(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM yearbook.post")
            .fetch_one(&self.pool)
            .await?;

        u64::try_from(count)
            .map_err(|e| RepositoryError::DataCorruption(format!("negative post count: {e}")))
    }

    async fn get_posts_by_ids(&self, ids: &[PostId]) -> Result<Vec<Post>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: Vec<&str> = ids.iter().map(PostId::as_str).collect();
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            "SELECT {POST_COLUMNS} FROM yearbook.post WHERE post_id = ANY($1) \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(wanted)
        .fetch_all(&self.pool)
        .await?;

        if rows.len() < ids.len() {
            debug!(
                wanted = ids.len(),
                found = rows.len(),
                "Skipping dangling post ids"
            );
        }

        rows.into_iter().map(Post::try_from).collect()
    }

    #[instrument(skip(self), fields(post_id = %id))]
    async fn delete_post(&self, id: &PostId) -> Result<Post, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            UPDATE yearbook.user
            SET inbound_posts = array_remove(inbound_posts, $1),
                outbound_posts = array_remove(outbound_posts, $1)
            WHERE $1 = ANY(inbound_posts) OR $1 = ANY(outbound_posts)
            ",
        )
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        let row: Option<PostRow> = sqlx::query_as(&format!(
            "DELETE FROM yearbook.post WHERE post_id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(RepositoryError::NotFound);
        };

        tx.commit().await?;
        debug!("Deleted post");
        row.try_into()
    }

    #[instrument(skip(self, user), fields(username = %user.username))]
    async fn add_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO yearbook.user \
                 (username, firstname, lastname, email, grade, register_date, registered) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.username.as_str())
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(&user.email)
        .bind(user.grade)
        .bind(user.register_date)
        .bind(user.registered)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "user"))?;

        debug!(id = %row.id, "Created user");
        row.try_into()
    }

    async fn get_user(&self, username: &Username) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM yearbook.user WHERE username = $1"
        ))
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    async fn get_all_users(&self) -> Result<Vec<User>, RepositoryError> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM yearbook.user ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn get_all_usernames(&self) -> Result<Vec<Username>, RepositoryError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT username FROM yearbook.user ORDER BY username")
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(|(u,)| parse_username(u)).collect()
    }

    async fn get_usernames_by_grade(&self, grade: Grade) -> Result<Vec<Username>, RepositoryError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT username FROM yearbook.user WHERE grade = $1 ORDER BY username",
        )
        .bind(grade)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|(u,)| parse_username(u)).collect()
    }

    #[instrument(skip(self, patch), fields(username = %patch.username))]
    async fn update_user(&self, patch: &UserPatch) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE yearbook.user SET \
                 nickname = COALESCE($2, nickname), \
                 profile_pic = COALESCE($3, profile_pic), \
                 bio = COALESCE($4, bio), \
                 will = COALESCE($5, will), \
                 grade = COALESCE($6, grade) \
             WHERE username = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(patch.username.as_str())
        .bind(patch.nickname.as_deref())
        .bind(patch.profile_pic.as_deref())
        .bind(patch.bio.as_deref())
        .bind(patch.will.as_deref())
        .bind(patch.grade)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    #[instrument(skip(self))]
    async fn delete_user(&self, username: &Username) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM yearbook.user WHERE username = $1")
            .bind(username.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn add_to_and_from(
        &self,
        post_id: &PostId,
        sender: &Username,
        recipients: &[Username],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        append_lists(&mut tx, post_id, sender, recipients).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, profile_pic))]
    async fn init_account(
        &self,
        username: &Username,
        profile_pic: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE yearbook.user
            SET registered = TRUE, profile_pic = $2
            WHERE username = $1
            ",
        )
        .bind(username.as_str())
        .bind(profile_pic)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, token), fields(sub = %token.sub))]
    async fn insert_token(&self, token: &StoredToken) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO yearbook.token (sub, token, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (sub) DO UPDATE
            SET token = EXCLUDED.token, email = EXCLUDED.email, updated_at = NOW()
            ",
        )
        .bind(&token.sub)
        .bind(token.token.expose_secret())
        .bind(&token.email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_token(&self, sub: &str) -> Result<Option<StoredToken>, RepositoryError> {
        let row: Option<TokenRow> =
            sqlx::query_as("SELECT sub, token, email FROM yearbook.token WHERE sub = $1")
                .bind(sub)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(StoredToken::from))
    }
}
