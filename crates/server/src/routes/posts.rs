//! Post route handlers.

use axum::extract::State;
use serde::Deserialize;

use yearbook_core::{Post, PostId, Username};

use super::envelope::{ApiJson, ApiPath, ApiResult, Envelope};
use crate::db::Store;
use crate::error::add_breadcrumb;
use crate::middleware::Caller;
use crate::state::AppState;

/// Request body for `createPost`.
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    /// Sending user, `first.last`.
    pub sender: String,
    /// Receiving users, `first.last`.
    pub recipients: Vec<String>,
    /// Message body.
    pub message: String,
    /// Base64-encoded images.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Create a post from the caller to one or more recipients.
///
/// Responds with the new post's id.
///
/// # Route
///
/// `POST {api_root}/createPost`
pub async fn create_post<S: Store>(
    State(state): State<AppState<S>>,
    caller: Caller,
    ApiJson(body): ApiJson<CreatePostRequest>,
) -> ApiResult<PostId> {
    let sender = Username::parse(&body.sender)?;
    caller.require(&sender, &state.config().email)?;

    let post = Post::new(
        sender.as_str(),
        &body.message,
        &body.images,
        &body.recipients,
        &state.config().limits,
    )?;
    state.store().publish_post(&post).await?;

    tracing::info!(
        post_id = %post.post_id(),
        sender = %post.sender(),
        recipients = post.recipients().len(),
        "Post created"
    );
    add_breadcrumb("post", "Created post", Some(&[("post_id", post.post_id().as_str())]));

    Ok(Envelope::ok(post.post_id().clone()))
}

/// Fetch one post.
///
/// # Route
///
/// `GET {api_root}/getPost/{id}`
pub async fn get_post<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Post> {
    let id = PostId::parse(&id)?;
    Ok(Envelope::ok(state.store().get_post(&id).await?))
}

/// Fetch every post, newest first.
///
/// # Route
///
/// `GET {api_root}/getPosts`
pub async fn get_posts<S: Store>(State(state): State<AppState<S>>) -> ApiResult<Vec<Post>> {
    Ok(Envelope::ok(state.store().get_all_posts().await?))
}

/// Fetch the `n` newest posts.
///
/// # Route
///
/// `GET {api_root}/getnPosts/{n}`
pub async fn get_n_posts<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(n): ApiPath<u32>,
) -> ApiResult<Vec<Post>> {
    Ok(Envelope::ok(state.store().get_n_posts(n, 0).await?))
}

/// Fetch `n` posts after skipping the `offset` newest.
///
/// # Route
///
/// `GET {api_root}/getnPostsOffset/{n}/{offset}`
pub async fn get_n_posts_offset<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath((n, offset)): ApiPath<(u32, u32)>,
) -> ApiResult<Vec<Post>> {
    Ok(Envelope::ok(state.store().get_n_posts(n, offset).await?))
}

/// Count posts.
///
/// # Route
///
/// `GET {api_root}/getNumPosts`
pub async fn get_num_posts<S: Store>(State(state): State<AppState<S>>) -> ApiResult<u64> {
    Ok(Envelope::ok(state.store().count_posts().await?))
}

/// Delete a post. Only its sender may do this.
///
/// # Route
///
/// `DELETE {api_root}/deletePost/{id}`
pub async fn delete_post<S: Store>(
    State(state): State<AppState<S>>,
    caller: Caller,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<&'static str> {
    let id = PostId::parse(&id)?;
    let post = state.store().get_post(&id).await?;
    caller.require(post.sender(), &state.config().email)?;

    state.store().delete_post(&id).await?;
    tracing::info!(post_id = %id, "Post deleted");

    Ok(Envelope::empty())
}
