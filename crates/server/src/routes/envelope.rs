//! The JSON envelope every API response is wrapped in, and extractors that
//! report their rejections in it.
//!
//! ```json
//! {"data": <payload or "">, "errors": ["..."]}
//! ```
//!
//! An empty `errors` list means success.

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope<T> {
    /// The payload, or `""` when there is nothing to return.
    pub data: T,
    /// Error messages. Empty on success.
    pub errors: Vec<String>,
}

impl<T> Envelope<T> {
    /// A successful response carrying `data`.
    pub const fn ok(data: T) -> Json<Self> {
        Json(Self {
            data,
            errors: Vec::new(),
        })
    }
}

impl Envelope<&'static str> {
    /// A successful response with no payload.
    #[must_use]
    pub const fn empty() -> Json<Self> {
        Self::ok("")
    }

    /// A failed response carrying one message.
    #[must_use]
    pub fn error(message: String) -> Self {
        Self {
            data: "",
            errors: vec![message],
        }
    }
}

/// Handler result for enveloped JSON responses.
pub type ApiResult<T> = crate::error::Result<Json<Envelope<T>>>;

/// `Json` extractor whose rejections are enveloped 400s.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Path` extractor whose rejections are enveloped 400s.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
