//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `YEARBOOK_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `YEARBOOK_BASE_URL` - Public URL of the API server
//! - `YEARBOOK_SESSION_SECRET` - Session cookie signing secret (min 64 chars, high entropy)
//! - `YEARBOOK_EMAIL_SUFFIX` - Accepted organization email suffix (e.g. `@school.org`)
//! - `OAUTH_CLIENT_ID` - Identity provider OAuth client ID
//! - `OAUTH_CLIENT_SECRET` - Identity provider OAuth client secret
//! - `OAUTH_REDIRECT_URL` - Frontend callback URL registered with the provider
//!
//! ## Optional
//! - `YEARBOOK_HOST` - Bind address (default: 127.0.0.1)
//! - `YEARBOOK_PORT` - Listen port (default: 8081)
//! - `YEARBOOK_API_ROOT` - Root path of the post/user API (default: /api)
//! - `YEARBOOK_OAUTH_ROOT` - Root path of the login routes (default: /api/oauth)
//! - `YEARBOOK_SESSION_TIMEOUT_MINUTES` - Session and cookie lifetime (default: 30)
//! - `YEARBOOK_MAX_EMAIL_LENGTH` - Longest accepted email (default: 128)
//! - `YEARBOOK_MAX_RECIPIENTS` - Recipients per post (default: 10)
//! - `YEARBOOK_MAX_IMAGES` - Images per post (default: 5)
//! - `YEARBOOK_MAX_MESSAGE_LENGTH` - Characters per message (default: 2000)
//! - `OAUTH_AUTH_URL` / `OAUTH_TOKEN_URL` / `OAUTH_USERINFO_URL` - Provider endpoints (default: Google)
//! - `OAUTH_SCOPES` - Space-separated scopes (default: `openid email profile`)
//! - `OAUTH_TIMEOUT_SECS` - Timeout for every provider call (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use yearbook_core::{EmailPolicy, PostLimits};

/// Signed cookies need a 64-byte master key.
const MIN_SESSION_SECRET_LENGTH: usize = 64;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Yearbook server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the server
    pub base_url: String,
    /// Root path of the protected API
    pub api_root: String,
    /// Root path of the OAuth login routes
    pub oauth_root: String,
    /// Session cookie signing secret
    pub session_secret: SecretString,
    /// Lifetime of the session and of the `token`/`username` cookies
    pub session_timeout: Duration,
    /// Organization email rules
    pub email: EmailPolicy,
    /// Post size limits
    pub limits: PostLimits,
    /// Identity provider configuration
    pub oauth: OAuthConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate
    pub sentry_sample_rate: f32,
    /// Sentry transaction sample rate
    pub sentry_traces_sample_rate: f32,
}

/// Identity provider (OAuth 2.0) configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Redirect URL registered with the provider
    pub redirect_url: String,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token exchange endpoint
    pub token_url: String,
    /// Userinfo endpoint
    pub userinfo_url: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Timeout applied to every provider request
    pub timeout: Duration,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_url", &self.redirect_url)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("scopes", &self.scopes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("YEARBOOK_DATABASE_URL")?;
        let host = get_parsed_or_default::<IpAddr>("YEARBOOK_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default::<u16>("YEARBOOK_PORT", "8081")?;
        let base_url = get_required_env("YEARBOOK_BASE_URL")?;
        let api_root = get_root_path("YEARBOOK_API_ROOT", "/api")?;
        let oauth_root = get_root_path("YEARBOOK_OAUTH_ROOT", "/api/oauth")?;
        let session_secret = get_validated_secret("YEARBOOK_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "YEARBOOK_SESSION_SECRET")?;
        let session_timeout = Duration::from_secs(
            60 * get_parsed_or_default::<u64>("YEARBOOK_SESSION_TIMEOUT_MINUTES", "30")?,
        );

        let email = email_policy_from_env()?;
        let limits = PostLimits {
            max_recipients: get_parsed_or_default("YEARBOOK_MAX_RECIPIENTS", "10")?,
            max_images: get_parsed_or_default("YEARBOOK_MAX_IMAGES", "5")?,
            max_message_length: get_parsed_or_default("YEARBOOK_MAX_MESSAGE_LENGTH", "2000")?,
        };

        let oauth = OAuthConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            api_root,
            oauth_root,
            session_secret,
            session_timeout,
            email,
            limits,
            oauth,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl OAuthConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let scopes = get_env_or_default("OAUTH_SCOPES", "openid email profile")
            .split_whitespace()
            .map(String::from)
            .collect();

        Ok(Self {
            client_id: get_required_env("OAUTH_CLIENT_ID")?,
            client_secret: get_validated_secret("OAUTH_CLIENT_SECRET")?,
            redirect_url: get_required_env("OAUTH_REDIRECT_URL")?,
            auth_url: get_env_or_default("OAUTH_AUTH_URL", GOOGLE_AUTH_URL),
            token_url: get_env_or_default("OAUTH_TOKEN_URL", GOOGLE_TOKEN_URL),
            userinfo_url: get_env_or_default("OAUTH_USERINFO_URL", GOOGLE_USERINFO_URL),
            scopes,
            timeout: Duration::from_secs(get_parsed_or_default("OAUTH_TIMEOUT_SECS", "5")?),
        })
    }
}

/// Load the organization email policy (`YEARBOOK_EMAIL_SUFFIX`, `YEARBOOK_MAX_EMAIL_LENGTH`).
///
/// Shared with the CLI, which derives usernames the same way the server does.
///
/// # Errors
///
/// Returns `ConfigError` if the suffix is missing or does not start with `@`.
pub fn email_policy_from_env() -> Result<EmailPolicy, ConfigError> {
    let suffix = get_required_env("YEARBOOK_EMAIL_SUFFIX")?;
    if !suffix.starts_with('@') || suffix.len() < 2 {
        return Err(ConfigError::InvalidEnvVar(
            "YEARBOOK_EMAIL_SUFFIX".to_string(),
            "must start with '@' followed by a domain".to_string(),
        ));
    }
    let max_length = get_parsed_or_default("YEARBOOK_MAX_EMAIL_LENGTH", "128")?;
    Ok(EmailPolicy::new(suffix, max_length))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable (or its default) parsed into `T`.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a route root such as `/api`, normalized without a trailing slash.
fn get_root_path(key: &str, default: &str) -> Result<String, ConfigError> {
    let value = get_env_or_default(key, default);
    let trimmed = value.trim_end_matches('/');
    if !trimmed.starts_with('/') || trimmed.len() < 2 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute path other than '/'".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn oauth_config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client_id_value".to_string(),
            client_secret: SecretString::from("super_secret_client_secret"),
            redirect_url: "http://localhost:3000/oauth".to_string(),
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(64), "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("x".repeat(32));
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_err());
    }

    #[test]
    fn test_validate_session_secret_valid_length() {
        let secret = SecretString::from("x".repeat(64));
        assert!(validate_session_secret(&secret, "TEST_SESSION").is_ok());
    }

    #[test]
    fn test_get_root_path_normalizes() {
        assert_eq!(
            get_root_path("YEARBOOK_TEST_UNSET_ROOT", "/api/").unwrap(),
            "/api"
        );
        assert!(get_root_path("YEARBOOK_TEST_UNSET_ROOT", "/").is_err());
        assert!(get_root_path("YEARBOOK_TEST_UNSET_ROOT", "api").is_err());
    }

    #[test]
    fn test_socket_addr_and_secure_cookies() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8081,
            base_url: "https://yearbook.example".to_string(),
            api_root: "/api".to_string(),
            oauth_root: "/api/oauth".to_string(),
            session_secret: SecretString::from("x".repeat(64)),
            session_timeout: Duration::from_secs(1800),
            email: EmailPolicy::new("@school.org", 128),
            limits: PostLimits::default(),
            oauth: oauth_config(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8081);
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_oauth_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", oauth_config());

        assert!(debug_output.contains("client_id_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_client_secret"));
    }
}
