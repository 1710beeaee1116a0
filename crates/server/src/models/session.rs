//! Session-related types.

/// Session keys for authentication data.
pub mod keys {
    /// Key for the OAuth anti-CSRF state issued by the login route.
    pub const OAUTH_STATE: &str = "oauth_state";
}
