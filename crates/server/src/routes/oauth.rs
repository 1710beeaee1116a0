//! OAuth login route handlers.
//!
//! - Login: issues an anti-CSRF state and returns the provider's authorization link
//! - Authorize: checks the state, exchanges the code and sets the client cookies

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse},
};
use rand::{Rng, distr::Alphanumeric};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tower_sessions::cookie::{Cookie, SameSite, time};

use yearbook_core::Username;

use super::envelope::{ApiJson, Envelope};
use crate::config::ServerConfig;
use crate::db::Store;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session_keys;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Length of the generated anti-CSRF state.
const STATE_LENGTH: usize = 32;

/// Cookie carrying the access token.
pub const TOKEN_COOKIE: &str = "token";

/// Cookie carrying the logged-in username.
pub const USERNAME_COOKIE: &str = "username";

/// Response body for `login`.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Provider authorization URL to send the user to.
    pub link: String,
    /// Anti-CSRF state the provider will echo back.
    pub state: String,
}

/// Request body for `authorize`.
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub code: String,
    pub state: String,
}

/// Response body for `authorize`.
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub username: Username,
    pub token: String,
    /// Whether the account had completed a login before this one.
    pub registered: bool,
}

fn generate_state() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session store: {e}"))
}

/// Build a client-readable cookie that lives as long as a session.
fn client_cookie(name: &'static str, value: String, config: &ServerConfig) -> String {
    let max_age = i64::try_from(config.session_timeout.as_secs()).unwrap_or(i64::MAX);
    Cookie::build((name, value))
        .path("/")
        .max_age(time::Duration::seconds(max_age))
        .secure(config.secure_cookies())
        .same_site(SameSite::Lax)
        .http_only(false)
        .build()
        .to_string()
}

/// Start an OAuth login.
///
/// # Route
///
/// `GET {oauth_root}/login`
pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<impl IntoResponse> {
    let oauth_state = generate_state();
    session
        .insert(session_keys::OAUTH_STATE, &oauth_state)
        .await
        .map_err(session_error)?;

    let link = state.oauth().authorization_url(&oauth_state);
    tracing::debug!("Issued OAuth state");

    Ok(Envelope::ok(LoginResponse {
        link,
        state: oauth_state,
    }))
}

/// Finish an OAuth login.
///
/// The session state is consumed whether or not it matches.
///
/// # Route
///
/// `POST {oauth_root}/authorize`
pub async fn authorize<S: Store>(
    State(state): State<AppState<S>>,
    session: Session,
    ApiJson(body): ApiJson<AuthorizeRequest>,
) -> Result<impl IntoResponse> {
    let stored: Option<String> = session
        .remove(session_keys::OAUTH_STATE)
        .await
        .map_err(session_error)?;

    if stored.as_deref() != Some(body.state.as_str()) {
        tracing::warn!("OAuth state mismatch");
        return Err(AuthError::InvalidSessionState.into());
    }

    let outcome = state.auth().complete_login(&body.code).await?;
    let token = outcome.token.expose_secret().to_string();

    tracing::info!(username = %outcome.username, registered = outcome.registered, "User logged in");
    add_breadcrumb(
        "auth",
        "OAuth login completed",
        Some(&[("username", outcome.username.as_str())]),
    );

    let config = state.config();
    let cookies = AppendHeaders([
        (SET_COOKIE, client_cookie(TOKEN_COOKIE, token.clone(), config)),
        (
            SET_COOKIE,
            client_cookie(USERNAME_COOKIE, outcome.username.to_string(), config),
        ),
    ]);

    Ok((
        cookies,
        Envelope::ok(AuthorizeResponse {
            username: outcome.username,
            token,
            registered: outcome.registered,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_state() {
        let a = generate_state();
        let b = generate_state();
        assert_eq!(a.len(), STATE_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
