//! HTTP route handlers for the yearbook API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                  - Liveness check
//! GET    /health/ready                            - Readiness check (store ping)
//!
//! # OAuth ({oauth_root}, default /api/oauth)
//! GET    /login                                   - Issue state, return provider link
//! POST   /authorize                               - Exchange code, set cookies
//!
//! # Posts ({api_root}, default /api; bearer token required)
//! POST   /createPost                              - Create a post (caller = sender)
//! GET    /getPost/{id}                            - One post
//! GET    /getPosts                                - All posts, newest first
//! GET    /getNumPosts                             - Post count
//! GET    /getnPosts/{n}                           - n newest posts
//! GET    /getnPostsOffset/{n}/{offset}            - n posts after offset
//! DELETE /deletePost/{id}                         - Delete a post (caller = sender)
//!
//! # Users ({api_root}; bearer token required)
//! PATCH  /updateUser                              - Update profile (caller = user)
//! GET    /getUser/{username}                      - One user
//! GET    /getUserWithAuthentication/{username}    - One user (caller = user)
//! GET    /getUsers                                - All users
//! GET    /getUsernames                            - All usernames
//! GET    /getSeniors                              - Senior usernames
//! GET    /getUserProfilePic/{username}            - Profile picture URL
//! GET    /getUserGrade/{username}                 - Grade
//! GET    /getActivity/{username}                  - Inbound posts with sender pictures (caller = user)
//! GET    /getUserPosts/{username}                 - Inbound and outbound posts
//! ```

pub mod envelope;
pub mod oauth;
pub mod posts;
pub mod users;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, patch, post},
};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;
use tower_sessions::cookie::KeyError;

use crate::db::Store;
use crate::middleware::{authorize_request, create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Largest accepted request body. Posts carry base64 images.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Bearer-protected API routes.
pub fn api_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        // Posts
        .route("/createPost", post(posts::create_post::<S>))
        .route("/getPost/{id}", get(posts::get_post::<S>))
        .route("/getPosts", get(posts::get_posts::<S>))
        .route("/getNumPosts", get(posts::get_num_posts::<S>))
        .route("/getnPosts/{n}", get(posts::get_n_posts::<S>))
        .route(
            "/getnPostsOffset/{n}/{offset}",
            get(posts::get_n_posts_offset::<S>),
        )
        .route("/deletePost/{id}", delete(posts::delete_post::<S>))
        // Users
        .route("/updateUser", patch(users::update_user::<S>))
        .route("/getUser/{username}", get(users::get_user::<S>))
        .route(
            "/getUserWithAuthentication/{username}",
            get(users::get_user_with_authentication::<S>),
        )
        .route("/getUsers", get(users::get_users::<S>))
        .route("/getUsernames", get(users::get_usernames::<S>))
        .route("/getSeniors", get(users::get_seniors::<S>))
        .route(
            "/getUserProfilePic/{username}",
            get(users::get_user_profile_pic::<S>),
        )
        .route("/getUserGrade/{username}", get(users::get_user_grade::<S>))
        .route("/getActivity/{username}", get(users::get_activity::<S>))
        .route("/getUserPosts/{username}", get(users::get_user_posts::<S>))
}

/// OAuth login routes.
pub fn oauth_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/login", get(oauth::login::<S>))
        .route("/authorize", post(oauth::authorize::<S>))
}

/// Build the complete application router.
///
/// Sentry layers are left to the caller so tests can run without them.
///
/// # Errors
///
/// Returns `KeyError` if the session secret cannot be turned into a signing key.
pub fn router<S, SS>(state: AppState<S>, session_store: SS) -> Result<Router, KeyError>
where
    S: Store,
    SS: SessionStore + Clone,
{
    let session_layer = create_session_layer(session_store, state.config())?;
    let api_root = state.config().api_root.clone();
    let oauth_root = state.config().oauth_root.clone();

    let api = api_routes::<S>().route_layer(middleware::from_fn_with_state(
        state.clone(),
        authorize_request::<S>,
    ));

    Ok(Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S>))
        .nest(&oauth_root, oauth_routes::<S>())
        .nest(&api_root, api)
        .with_state(state)
        .layer(session_layer)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        ))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness<S: Store>(State(state): State<AppState<S>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use secrecy::SecretString;
    use tower::ServiceExt;
    use yearbook_core::{EmailPolicy, PostLimits};

    use super::*;
    use crate::config::{OAuthConfig, ServerConfig};
    use crate::db::MemoryStore;

    fn config() -> ServerConfig {
        let provider = "http://127.0.0.1:9";
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/unused"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8081,
            base_url: "http://localhost:8081".to_string(),
            api_root: "/api".to_string(),
            oauth_root: "/api/oauth".to_string(),
            session_secret: SecretString::from(
                "Qm9vdHN0cmFwIGtleSBmb3Igcm91dGVyIHRlc3RzIG9ubHkgMTIzNDU2Nzg5MGFiY2RlZg",
            ),
            session_timeout: Duration::from_secs(1800),
            email: EmailPolicy::new("@school.org", 128),
            limits: PostLimits::default(),
            oauth: OAuthConfig {
                client_id: "yearbook".to_string(),
                client_secret: SecretString::from("provider-client-credential"),
                redirect_url: "http://localhost:3000/oauth".to_string(),
                auth_url: format!("{provider}/authorize"),
                token_url: format!("{provider}/token"),
                userinfo_url: format!("{provider}/userinfo"),
                scopes: vec!["openid".to_string(), "email".to_string()],
                timeout: Duration::from_secs(1),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    fn app() -> Router {
        let state = AppState::new(config(), MemoryStore::new()).unwrap();
        router(state, tower_sessions::MemoryStore::default()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app()
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let response = app()
            .oneshot(Request::get("/api/getPosts").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["data"], "");
        assert_eq!(body["errors"][0], "authentication failed");
    }

    #[tokio::test]
    async fn test_wrong_case_bearer_marker_is_rejected() {
        let response = app()
            .oneshot(
                Request::get("/api/getUsers")
                    .header(header::AUTHORIZATION, "Bearer abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_issues_state_and_session() {
        let response = app()
            .oneshot(Request::get("/api/oauth/login").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("yb_session="));

        let body = body_json(response).await;
        let state = body["data"]["state"].as_str().unwrap();
        let link = body["data"]["link"].as_str().unwrap();
        assert_eq!(state.len(), 32);
        assert!(link.starts_with("http://127.0.0.1:9/authorize?"));
        assert!(link.contains(&format!("state={state}")));
    }

    #[tokio::test]
    async fn test_authorize_without_login_is_rejected() {
        let response = app()
            .oneshot(
                Request::post("/api/oauth/authorize")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"code":"abc","state":"xyz"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authorize_rejects_malformed_body() {
        let response = app()
            .oneshot(
                Request::post("/api/oauth/authorize")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"code":"abc"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["data"], "");
        assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    }
}
