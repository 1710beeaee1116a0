//! Domain models for the yearbook server.

pub mod session;
pub mod user;

pub use session::keys as session_keys;
pub use user::{StoredToken, User, UserPatch};
