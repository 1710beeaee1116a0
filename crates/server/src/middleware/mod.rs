//! HTTP middleware stack for the yearbook server.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Body size limit
//! 5. Session layer (tower-sessions; only the OAuth routes read it)
//! 6. Bearer authorization (API routes only)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{Caller, authorize_request};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
