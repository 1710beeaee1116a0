//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::oauth::OAuthError;

/// Errors that can occur during authentication operations.
///
/// Every variant except `Provider` and `Repository` is a client failure and
/// is reported to the client as one generic message.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The `Authorization` header is absent or not of the form `bearer <token>`.
    #[error("missing or malformed authorization header")]
    MissingToken,

    /// The identity provider did not accept the presented token or code.
    #[error("identity provider rejected the credentials")]
    ProviderRejected,

    /// No token has been stored for the resolved subject.
    #[error("no stored token for subject")]
    UnknownSubject,

    /// The presented token is not the one stored for the subject.
    #[error("token does not match stored token")]
    TokenMismatch,

    /// The caller is not the user named in the request.
    #[error("caller does not match username")]
    UsernameMismatch,

    /// The provider account's email is not an organization email.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] yearbook_core::UsernameError),

    /// OAuth state missing from the session or different from the one returned.
    #[error("invalid session state")]
    InvalidSessionState,

    /// The identity provider could not be reached or answered garbage.
    #[error("identity provider error: {0}")]
    Provider(OAuthError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<OAuthError> for AuthError {
    fn from(e: OAuthError) -> Self {
        match e {
            OAuthError::Rejected(_) => Self::ProviderRejected,
            other => Self::Provider(other),
        }
    }
}

impl AuthError {
    /// Whether this is the caller's fault rather than an upstream failure.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Provider(_) | Self::Repository(_))
    }
}
