//! Session middleware configuration.
//!
//! Sessions only carry the OAuth anti-CSRF state between the login and
//! authorize calls. They are `PostgreSQL`-backed in production and the
//! cookie is signed with the configured session secret.

use secrecy::ExposeSecret;
use tower_sessions::cookie::{Key, KeyError, SameSite};
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};

use crate::config::ServerConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "yb_session";

/// Create the session layer over any session store.
///
/// # Arguments
///
/// * `store` - Session store (`PostgresStore` in production)
/// * `config` - Server configuration (for the secret, timeout and cookie flags)
///
/// # Errors
///
/// Returns `KeyError` if the session secret is too short to derive a signing key.
pub fn create_session_layer<Store: SessionStore>(
    store: Store,
    config: &ServerConfig,
) -> Result<SessionManagerLayer<Store, SignedCookie>, KeyError> {
    let key = Key::try_from(config.session_secret.expose_secret().as_bytes())?;
    let timeout = i64::try_from(config.session_timeout.as_secs()).unwrap_or(i64::MAX);

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(timeout),
        ))
        .with_secure(config.secure_cookies())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(key))
}
