//! Authentication service.
//!
//! Revalidates bearer tokens against the identity provider and the stored
//! token table, checks that a caller is the user a request names, and
//! completes the OAuth login flow.

mod error;

pub use error::AuthError;

use secrecy::SecretString;

use yearbook_core::{EmailPolicy, Grade, NewUser, Username};

use crate::db::{RepositoryError, Store};
use crate::models::user::StoredToken;
use crate::oauth::OAuthClient;

/// Marker that must precede the token in the `Authorization` header.
pub const BEARER_PREFIX: &str = "bearer ";

/// A caller whose bearer token matched the stored token for their subject.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Identity-provider subject id.
    pub sub: String,
    /// Email the provider reported for the token.
    pub email: String,
}

/// Result of a completed OAuth login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// The local user the account resolved to.
    pub username: Username,
    /// The access token the client should present from now on.
    pub token: SecretString,
    /// Whether the user had already completed a first login before this one.
    pub registered: bool,
}

/// Extract the token from an `Authorization` header value.
///
/// The marker is case-sensitive: `bearer abc` is accepted, `Bearer abc` is not.
///
/// # Errors
///
/// Returns `AuthError::MissingToken` if the header is absent, lacks the
/// marker, or carries an empty token.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Check that an authenticated caller is the user named by a request.
///
/// # Errors
///
/// Returns `AuthError::InvalidEmail` if the caller's email is not an
/// organization email, or `AuthError::UsernameMismatch` if it maps to a
/// different user.
pub fn authenticate(
    identity: &Identity,
    username: &Username,
    policy: &EmailPolicy,
) -> Result<(), AuthError> {
    let caller = policy.username_from_email(&identity.email)?;
    if &caller != username {
        return Err(AuthError::UsernameMismatch);
    }
    Ok(())
}

/// Authentication service.
pub struct AuthService<'a, S> {
    store: &'a S,
    oauth: &'a OAuthClient,
    policy: &'a EmailPolicy,
}

impl<'a, S: Store> AuthService<'a, S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a S, oauth: &'a OAuthClient, policy: &'a EmailPolicy) -> Self {
        Self {
            store,
            oauth,
            policy,
        }
    }

    /// Revalidate a bearer token.
    ///
    /// Resolves the token to a subject through the identity provider, then
    /// requires the stored token for that subject to be byte-for-byte equal
    /// to the presented one.
    ///
    /// # Errors
    ///
    /// Returns a client `AuthError` if the token is rejected or stale, or
    /// `Provider`/`Repository` if an upstream call fails.
    pub async fn verify_bearer(&self, header: Option<&str>) -> Result<Identity, AuthError> {
        let token = bearer_token(header)?;
        let info = self.oauth.user_info(token).await?;

        let stored = self
            .store
            .get_token(&info.sub)
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        if !stored.matches(token) {
            return Err(AuthError::TokenMismatch);
        }

        Ok(Identity {
            sub: info.sub,
            email: info.email,
        })
    }

    /// Complete an OAuth login after the state check has passed.
    ///
    /// Exchanges the code, records the new token for the subject, creates
    /// the local user on first sight (as an unregistered freshman), and
    /// finishes account setup for users who have not logged in before.
    ///
    /// # Errors
    ///
    /// Returns `ProviderRejected` for a bad code, `InvalidEmail` for an
    /// account outside the organization, or `Provider`/`Repository` if an
    /// upstream call fails.
    pub async fn complete_login(&self, code: &str) -> Result<LoginOutcome, AuthError> {
        let token = self.oauth.exchange_code(code).await?;
        let info = self.oauth.user_info(&token.access_token).await?;
        let username = self.policy.username_from_email(&info.email)?;

        self.store
            .insert_token(&StoredToken {
                sub: info.sub.clone(),
                token: SecretString::from(token.access_token.clone()),
                email: info.email.clone(),
            })
            .await?;

        let user = match self.store.get_user(&username).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound) => {
                tracing::info!(%username, "Creating user on first login");
                let new_user =
                    NewUser::from_username(username.clone(), Grade::Freshman, false, self.policy);
                match self.store.add_user(&new_user).await {
                    Ok(user) => user,
                    // A concurrent first login created the row first
                    Err(RepositoryError::Conflict(_)) => self.store.get_user(&username).await?,
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        if !user.registered {
            self.store.init_account(&username, info.picture.as_deref()).await?;
            tracing::info!(%username, "Initialized account");
        }

        Ok(LoginOutcome {
            username,
            token: SecretString::from(token.access_token),
            registered: user.registered,
        })
    }
}
