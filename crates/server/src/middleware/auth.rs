//! Bearer-token authorization middleware and extractors.
//!
//! Every route under the API root passes through [`authorize_request`], which
//! revalidates the caller's token on each request. Handlers that must also
//! confirm "the caller is the user this request names" take a [`Caller`] and
//! call [`Caller::require`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};

use yearbook_core::{EmailPolicy, Username};

use crate::db::Store;
use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, Identity, authenticate};
use crate::state::AppState;

/// Middleware that rejects requests without a valid, current bearer token.
///
/// On success the resolved [`Identity`] is stored in the request extensions
/// for [`Caller`] to pick up.
///
/// # Errors
///
/// Returns `AppError::Auth` (401) for any token problem, or 500 if the
/// identity provider or the store cannot be reached.
pub async fn authorize_request<S: Store>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let identity = state.auth().verify_bearer(header).await?;
    tracing::debug!(sub = %identity.sub, "Authorized request");

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extractor for the identity established by [`authorize_request`].
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(State(state): State<AppState>, caller: Caller) -> Result<..> {
///     caller.require(&username, &state.config().email)?;
///     ...
/// }
/// ```
pub struct Caller(pub Identity);

impl Caller {
    /// Require the caller to be `username`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Auth` if the caller is someone else.
    pub fn require(&self, username: &Username, policy: &EmailPolicy) -> Result<(), AppError> {
        authenticate(&self.0, username, policy)?;
        set_sentry_user(username, Some(&self.0.email));
        Ok(())
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or(AppError::Auth(AuthError::MissingToken))
    }
}
