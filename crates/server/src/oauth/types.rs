//! Types for identity-provider OAuth responses.

use serde::Deserialize;

/// Access token obtained by exchanging an authorization code.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderToken {
    /// The access token presented as a bearer token on later requests.
    pub access_token: String,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// The ID token (`OpenID` Connect).
    #[serde(default)]
    pub id_token: Option<String>,
}

/// The subset of the provider's userinfo response the yearbook uses.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    /// Stable subject identifier.
    pub sub: String,
    /// The account's email address.
    pub email: String,
    /// Whether the provider has verified the email.
    #[serde(default)]
    pub email_verified: Option<bool>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Profile picture URL.
    #[serde(default)]
    pub picture: Option<String>,
}
