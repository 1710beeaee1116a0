//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Errors are rendered in the API envelope: `{"data": "", "errors": [message]}`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use yearbook_core::{PostError, PostIdError, UsernameError};

use crate::db::RepositoryError;
use crate::routes::envelope::Envelope;
use crate::services::auth::AuthError;

/// The only message clients ever see for an authentication failure.
pub const AUTH_FAILED: &str = "authentication failed";

/// Application-level error type for the yearbook API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Post input failed validation.
    #[error(transparent)]
    InvalidPost(#[from] PostError),

    /// A username in the request is malformed.
    #[error(transparent)]
    InvalidUsername(#[from] UsernameError),

    /// A post id in the request is malformed.
    #[error(transparent)]
    InvalidPostId(#[from] PostIdError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => {
                if err.is_client_error() {
                    StatusCode::UNAUTHORIZED
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
            Self::InvalidPost(PostError::Encoding(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::InvalidPost(_)
            | Self::InvalidUsername(_)
            | Self::InvalidPostId(_)
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The message shown to clients. Internal details are never exposed.
    fn client_message(&self) -> String {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => "not found".to_string(),
                RepositoryError::Conflict(msg) => msg.clone(),
                _ => "Internal server error".to_string(),
            },
            Self::Auth(err) => {
                if err.is_client_error() {
                    AUTH_FAILED.to_string()
                } else {
                    "Internal server error".to_string()
                }
            }
            Self::Internal(_) | Self::InvalidPost(PostError::Encoding(_)) => {
                "Internal server error".to_string()
            }
            Self::BadRequest(msg) => msg.clone(),
            Self::InvalidPost(err) => err.to_string(),
            Self::InvalidUsername(err) => err.to_string(),
            Self::InvalidPostId(err) => err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::info!(error = %self, "Request rejected");
        }

        (status, Json(Envelope::error(self.client_message()))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a username.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(username: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            username: Some(username.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("post", "Created post", Some(&[("post_id", "ab12...")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict(
                "post already exists".to_string()
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::TokenMismatch)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Auth(AuthError::Repository(
                RepositoryError::DataCorruption("bad".to_string())
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::InvalidPost(PostError::EmptyMessage)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_auth_errors_share_one_message() {
        for err in [
            AuthError::MissingToken,
            AuthError::TokenMismatch,
            AuthError::UsernameMismatch,
            AuthError::InvalidSessionState,
        ] {
            let body = body_json(AppError::Auth(err)).await;
            assert_eq!(body["data"], "");
            assert_eq!(body["errors"], serde_json::json!([AUTH_FAILED]));
        }
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let body = body_json(AppError::Internal("connection string leaked".to_string())).await;
        assert_eq!(body["errors"], serde_json::json!(["Internal server error"]));
    }

    #[tokio::test]
    async fn test_post_encoding_failure_is_internal() {
        let source = serde_json::from_str::<u8>("not a number").unwrap_err();
        let err = AppError::InvalidPost(PostError::Encoding(source));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(err).await;
        assert_eq!(body["errors"], serde_json::json!(["Internal server error"]));
    }
}
