//! End-to-end test harness for the yearbook API.
//!
//! [`TestContext::start`] binds two servers on `127.0.0.1:0`:
//!
//! - a mock OAuth identity provider (token and userinfo endpoints)
//! - the real yearbook router over a [`MemoryStore`] and in-memory sessions
//!
//! # Mock provider
//!
//! The authorization code is the email's local part (`jane.doe`). Every
//! exchange issues a fresh access token, so logging in twice invalidates the
//! previous token. Codes containing `outsider` resolve to a non-organization
//! email.
//!
//! ```rust,ignore
//! let ctx = TestContext::start().await;
//! let jane = ctx.login("jane.doe").await;
//! let resp = ctx.get("/api/getPosts", Some(&jane.token)).await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::{get, post},
};
use reqwest::Client;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};

use yearbook_core::{EmailPolicy, PostLimits};
use yearbook_server::config::{OAuthConfig, ServerConfig};
use yearbook_server::db::MemoryStore;
use yearbook_server::routes;
use yearbook_server::state::AppState;

/// Organization email suffix used by every test.
pub const EMAIL_SUFFIX: &str = "@school.org";

/// Picture URL the mock provider reports for `local`.
#[must_use]
pub fn picture_for(local: &str) -> String {
    format!("https://pictures.test/{local}.png")
}

#[derive(Default)]
struct Provider {
    /// Issued access token to email local part.
    tokens: Mutex<HashMap<String, String>>,
    issued: Mutex<u64>,
}

#[derive(Deserialize)]
struct TokenForm {
    code: String,
    grant_type: String,
}

async fn token(
    State(provider): State<Arc<Provider>>,
    Form(form): Form<TokenForm>,
) -> Result<Json<Value>, StatusCode> {
    if form.grant_type != "authorization_code" || form.code.is_empty() || form.code == "bad" {
        return Err(StatusCode::BAD_REQUEST);
    }

    let n = {
        let mut issued = provider.issued.lock().unwrap();
        *issued += 1;
        *issued
    };
    let access_token = format!("tok-{n}-{}", form.code);
    provider
        .tokens
        .lock()
        .unwrap()
        .insert(access_token.clone(), form.code);

    Ok(Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
    })))
}

async fn userinfo(
    State(provider): State<Arc<Provider>>,
    headers: HeaderMap,
) -> Result<Json<Value>, StatusCode> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let local = provider
        .tokens
        .lock()
        .unwrap()
        .get(presented)
        .cloned()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let email = if local.contains("outsider") {
        format!("{local}@elsewhere.org")
    } else {
        format!("{local}{EMAIL_SUFFIX}")
    };

    Ok(Json(json!({
        "sub": format!("sub-{local}"),
        "email": email,
        "email_verified": true,
        "picture": picture_for(&local),
    })))
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn config(provider: SocketAddr) -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://localhost/unused"),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://127.0.0.1".to_string(),
        api_root: "/api".to_string(),
        oauth_root: "/api/oauth".to_string(),
        session_secret: SecretString::from(
            "R7f2kQ9wLz3mXb8vNc5tYh1jPd6sGa4eUo0iWq2rTy7uIp3lKj9hGf5dSa1zXc8v",
        ),
        session_timeout: Duration::from_secs(1800),
        email: EmailPolicy::new(EMAIL_SUFFIX, 128),
        limits: PostLimits::default(),
        oauth: OAuthConfig {
            client_id: "yearbook-tests".to_string(),
            client_secret: SecretString::from("mock-provider-client-credential"),
            redirect_url: "http://127.0.0.1/oauth".to_string(),
            auth_url: format!("http://{provider}/authorize"),
            token_url: format!("http://{provider}/token"),
            userinfo_url: format!("http://{provider}/userinfo"),
            scopes: vec!["openid".to_string(), "email".to_string()],
            timeout: Duration::from_secs(5),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// A logged-in test user.
pub struct Session {
    pub client: Client,
    pub username: String,
    pub token: String,
    pub registered: bool,
}

/// A running yearbook server and its mock identity provider.
pub struct TestContext {
    pub base_url: String,
    pub provider_url: String,
}

impl TestContext {
    /// Start the mock provider and the yearbook server.
    pub async fn start() -> Self {
        let provider = Router::new()
            .route("/token", post(token))
            .route("/userinfo", get(userinfo))
            .with_state(Arc::new(Provider::default()));
        let provider_addr = serve(provider).await;

        let state = AppState::new(config(provider_addr), MemoryStore::new()).unwrap();
        let app = routes::router(state, tower_sessions::MemoryStore::default()).unwrap();
        let addr = serve(app).await;

        Self {
            base_url: format!("http://{addr}"),
            provider_url: format!("http://{provider_addr}"),
        }
    }

    /// A fresh client with its own cookie jar.
    #[must_use]
    pub fn client() -> Client {
        Client::builder().cookie_store(true).build().unwrap()
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Run `GET {oauth_root}/login` and return the issued state.
    pub async fn start_login(&self, client: &Client) -> String {
        let resp = client.get(self.url("/api/oauth/login")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["data"]["state"].as_str().unwrap().to_string()
    }

    /// Run `POST {oauth_root}/authorize` with `code` and `state`.
    pub async fn authorize(&self, client: &Client, code: &str, state: &str) -> reqwest::Response {
        client
            .post(self.url("/api/oauth/authorize"))
            .json(&json!({ "code": code, "state": state }))
            .send()
            .await
            .unwrap()
    }

    /// Obtain an access token straight from the mock provider.
    ///
    /// The provider accepts the token, but the yearbook server has never
    /// seen it.
    pub async fn provider_token(&self, local: &str) -> String {
        let resp = Self::client()
            .post(format!("{}/token", self.provider_url))
            .form(&[("code", local), ("grant_type", "authorization_code")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Complete a full login for the account whose email local part is `local`.
    pub async fn login(&self, local: &str) -> Session {
        let client = Self::client();
        let state = self.start_login(&client).await;
        let resp = self.authorize(&client, local, &state).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = resp.json().await.unwrap();
        Session {
            client,
            username: body["data"]["username"].as_str().unwrap().to_string(),
            token: body["data"]["token"].as_str().unwrap().to_string(),
            registered: body["data"]["registered"].as_bool().unwrap(),
        }
    }

    /// `GET` an API path, with a bearer token if one is given.
    pub async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut req = Self::client().get(self.url(path));
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("bearer {token}"));
        }
        req.send().await.unwrap()
    }

    /// Send a JSON body to an API path with a bearer token.
    pub async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
        body: &Value,
    ) -> reqwest::Response {
        Self::client()
            .request(method, self.url(path))
            .header(AUTHORIZATION, format!("bearer {token}"))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// `DELETE` an API path with a bearer token.
    pub async fn delete(&self, path: &str, token: &str) -> reqwest::Response {
        Self::client()
            .delete(self.url(path))
            .header(AUTHORIZATION, format!("bearer {token}"))
            .send()
            .await
            .unwrap()
    }
}

/// Parse an enveloped response body.
pub async fn envelope(resp: reqwest::Response) -> Value {
    resp.json().await.unwrap()
}
