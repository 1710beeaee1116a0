//! User route handlers.

use std::collections::HashMap;

use axum::extract::State;
use serde::{Deserialize, Serialize};

use yearbook_core::{Grade, Post, Username};

use super::envelope::{ApiJson, ApiPath, ApiResult, Envelope};
use crate::db::{RepositoryError, Store};
use crate::middleware::Caller;
use crate::models::user::{User, UserPatch};
use crate::state::AppState;

/// Request body for `updateUser`.
///
/// Absent or empty fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    /// The user to update; must be the caller.
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub will: Option<String>,
    #[serde(default)]
    pub grade: Option<Grade>,
}

/// One entry of a user's activity feed.
#[derive(Debug, Serialize)]
pub struct ActivityItem {
    /// A post addressed to the user.
    pub post: Post,
    /// The sender's profile picture, if they have one.
    pub sender_profile_pic: Option<String>,
}

/// Posts addressed to and sent by one user.
#[derive(Debug, Serialize)]
pub struct UserPosts {
    pub inbound: Vec<Post>,
    pub outbound: Vec<Post>,
}

/// Update the caller's profile.
///
/// # Route
///
/// `PATCH {api_root}/updateUser`
pub async fn update_user<S: Store>(
    State(state): State<AppState<S>>,
    caller: Caller,
    ApiJson(body): ApiJson<UpdateUserRequest>,
) -> ApiResult<User> {
    let username = Username::parse(&body.username)?;
    caller.require(&username, &state.config().email)?;

    let patch = UserPatch::new(username)
        .nickname(body.nickname)
        .profile_pic(body.profile_pic)
        .bio(body.bio)
        .will(body.will)
        .grade(body.grade);

    let user = if patch.is_empty() {
        state.store().get_user(&patch.username).await?
    } else {
        state.store().update_user(&patch).await?
    };

    tracing::info!(username = %user.username, "User updated");
    Ok(Envelope::ok(user))
}

/// Fetch one user.
///
/// # Route
///
/// `GET {api_root}/getUser/{username}`
pub async fn get_user<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<User> {
    let username = Username::parse(&username)?;
    Ok(Envelope::ok(state.store().get_user(&username).await?))
}

/// Fetch the caller's own user record.
///
/// # Route
///
/// `GET {api_root}/getUserWithAuthentication/{username}`
pub async fn get_user_with_authentication<S: Store>(
    State(state): State<AppState<S>>,
    caller: Caller,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<User> {
    let username = Username::parse(&username)?;
    caller.require(&username, &state.config().email)?;
    Ok(Envelope::ok(state.store().get_user(&username).await?))
}

/// Fetch every user.
///
/// # Route
///
/// `GET {api_root}/getUsers`
pub async fn get_users<S: Store>(State(state): State<AppState<S>>) -> ApiResult<Vec<User>> {
    Ok(Envelope::ok(state.store().get_all_users().await?))
}

/// Fetch every username.
///
/// # Route
///
/// `GET {api_root}/getUsernames`
pub async fn get_usernames<S: Store>(
    State(state): State<AppState<S>>,
) -> ApiResult<Vec<Username>> {
    Ok(Envelope::ok(state.store().get_all_usernames().await?))
}

/// Fetch the usernames of every senior.
///
/// # Route
///
/// `GET {api_root}/getSeniors`
pub async fn get_seniors<S: Store>(State(state): State<AppState<S>>) -> ApiResult<Vec<Username>> {
    Ok(Envelope::ok(
        state.store().get_usernames_by_grade(Grade::Senior).await?,
    ))
}

/// Fetch a user's profile picture URL (`""` if unset).
///
/// # Route
///
/// `GET {api_root}/getUserProfilePic/{username}`
pub async fn get_user_profile_pic<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<String> {
    let username = Username::parse(&username)?;
    let user = state.store().get_user(&username).await?;
    Ok(Envelope::ok(user.profile_pic.unwrap_or_default()))
}

/// Fetch a user's grade.
///
/// # Route
///
/// `GET {api_root}/getUserGrade/{username}`
pub async fn get_user_grade<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<Grade> {
    let username = Username::parse(&username)?;
    Ok(Envelope::ok(state.store().get_user(&username).await?.grade))
}

/// Fetch the caller's inbound posts with each sender's profile picture.
///
/// # Route
///
/// `GET {api_root}/getActivity/{username}`
pub async fn get_activity<S: Store>(
    State(state): State<AppState<S>>,
    caller: Caller,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<Vec<ActivityItem>> {
    let username = Username::parse(&username)?;
    caller.require(&username, &state.config().email)?;

    let inbound = state.store().get_user_inbound(&username).await?;

    let mut pictures: HashMap<Username, Option<String>> = HashMap::new();
    let mut activity = Vec::with_capacity(inbound.len());
    for post in inbound {
        let sender = post.sender().clone();
        let sender_profile_pic = if let Some(picture) = pictures.get(&sender) {
            picture.clone()
        } else {
            let picture = match state.store().get_user(&sender).await {
                Ok(user) => user.profile_pic,
                Err(RepositoryError::NotFound) => None,
                Err(e) => return Err(e.into()),
            };
            pictures.insert(sender, picture.clone());
            picture
        };
        activity.push(ActivityItem {
            post,
            sender_profile_pic,
        });
    }

    Ok(Envelope::ok(activity))
}

/// Fetch the posts addressed to and sent by a user.
///
/// # Route
///
/// `GET {api_root}/getUserPosts/{username}`
pub async fn get_user_posts<S: Store>(
    State(state): State<AppState<S>>,
    ApiPath(username): ApiPath<String>,
) -> ApiResult<UserPosts> {
    let username = Username::parse(&username)?;
    let (inbound, outbound) = state.store().get_user_inbound_outbound(&username).await?;
    Ok(Envelope::ok(UserPosts { inbound, outbound }))
}
