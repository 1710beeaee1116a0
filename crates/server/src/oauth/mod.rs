//! Identity provider (OAuth 2.0) client.
//!
//! # OAuth Flow
//!
//! 1. Generate authorization URL with `authorization_url()`
//! 2. The frontend sends the user to the provider's consent page
//! 3. The provider redirects back to the frontend with `code` and `state`
//! 4. Exchange the code for an access token with `exchange_code()`
//! 5. Resolve the token to a subject and email with `user_info()`
//!
//! Step 5 is repeated on every protected API request to revalidate the
//! caller's bearer token.

mod types;

pub use types::*;

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::config::OAuthConfig;

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("identity provider rejected the request ({0})")]
    Rejected(StatusCode),

    /// The provider's response could not be understood.
    #[error("malformed identity provider response: {0}")]
    Malformed(String),

    /// A configured provider URL is invalid.
    #[error("invalid identity provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Client for the configured identity provider.
///
/// Cheap to clone. Every request carries the configured timeout.
#[derive(Clone)]
pub struct OAuthClient {
    inner: Arc<OAuthClientInner>,
}

struct OAuthClientInner {
    client: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    auth_url: Url,
    token_url: Url,
    userinfo_url: Url,
    scopes: String,
}

impl OAuthClient {
    /// Create a new identity provider client.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::InvalidUrl` if a configured endpoint is not a URL,
    /// or `OAuthError::Http` if the HTTP client cannot be built.
    pub fn new(config: &OAuthConfig) -> Result<Self, OAuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("yearbook/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(OAuthClientInner {
                client,
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                redirect_url: config.redirect_url.clone(),
                auth_url: Url::parse(&config.auth_url)?,
                token_url: Url::parse(&config.token_url)?,
                userinfo_url: Url::parse(&config.userinfo_url)?,
                scopes: config.scopes.join(" "),
            }),
        })
    }

    /// Generate the provider's authorization URL for a login attempt.
    ///
    /// # Arguments
    ///
    /// * `state` - A random string stored in the session to prevent CSRF attacks
    #[must_use]
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.inner.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.inner.client_id)
            .append_pair("redirect_uri", &self.inner.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.inner.scopes)
            .append_pair("access_type", "offline")
            .append_pair("state", state);
        url.into()
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Rejected` if the provider refuses the code, or
    /// `OAuthError::Http`/`Malformed` on transport or decoding failures.
    pub async fn exchange_code(&self, code: &str) -> Result<ProviderToken, OAuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.inner.client_id.as_str()),
            ("client_secret", self.inner.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", self.inner.redirect_url.as_str()),
        ];

        let response = self
            .inner
            .client
            .post(self.inner.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!(%status, "Token exchange rejected by identity provider");
            return Err(OAuthError::Rejected(status));
        }

        response.json().await.map_err(decode_error)
    }

    /// Resolve an access token to the account it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::Rejected` if the provider does not accept the
    /// token, or `OAuthError::Http`/`Malformed` on transport or decoding
    /// failures.
    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, OAuthError> {
        let response = self
            .inner
            .client
            .get(self.inner.userinfo_url.clone())
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OAuthError::Rejected(response.status()));
        }

        response.json().await.map_err(decode_error)
    }
}

fn decode_error(e: reqwest::Error) -> OAuthError {
    if e.is_decode() {
        OAuthError::Malformed(e.to_string())
    } else {
        OAuthError::Http(e)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "yearbook-client".to_string(),
            client_secret: SecretString::from("s3cr3t"),
            redirect_url: "https://yearbook.example/oauth".to_string(),
            auth_url: "https://accounts.example/o/oauth2/auth".to_string(),
            token_url: "https://accounts.example/token".to_string(),
            userinfo_url: "https://accounts.example/userinfo".to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_authorization_url_contains_parameters() {
        let client = OAuthClient::new(&config()).unwrap();
        let url = Url::parse(&client.authorization_url("abc123")).unwrap();

        assert_eq!(url.host_str(), Some("accounts.example"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some("yearbook-client"));
        assert_eq!(get("redirect_uri"), Some("https://yearbook.example/oauth"));
        assert_eq!(get("response_type"), Some("code"));
        assert_eq!(get("scope"), Some("openid email"));
        assert_eq!(get("state"), Some("abc123"));
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let mut config = config();
        config.token_url = "not a url".to_string();
        assert!(matches!(
            OAuthClient::new(&config),
            Err(OAuthError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_user_info_deserializes_minimal_payload() {
        let info: UserInfo =
            serde_json::from_str(r#"{"sub":"1234","email":"cool.dude@school.org"}"#).unwrap();
        assert_eq!(info.sub, "1234");
        assert_eq!(info.email, "cool.dude@school.org");
        assert!(info.picture.is_none());
    }
}
