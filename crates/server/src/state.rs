//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::{PgStore, Store};
use crate::oauth::{OAuthClient, OAuthError};
use crate::services::auth::AuthService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store and configuration. The store is a type
/// parameter so tests can run the real router against a `MemoryStore`.
pub struct AppState<S = PgStore> {
    inner: Arc<AppStateInner<S>>,
}

struct AppStateInner<S> {
    config: ServerConfig,
    store: S,
    oauth: OAuthClient,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Store> AppState<S> {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `store` - Data-access layer
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider configuration is invalid.
    pub fn new(config: ServerConfig, store: S) -> Result<Self, OAuthError> {
        let oauth = OAuthClient::new(&config.oauth)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                oauth,
            }),
        })
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the data-access layer.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.inner.oauth
    }

    /// Build an authentication service over this state.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_, S> {
        AuthService::new(self.store(), self.oauth(), &self.inner.config.email)
    }
}
